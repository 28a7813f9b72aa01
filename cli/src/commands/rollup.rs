use anyhow::{ensure, Result};
use gridzone::{rollup_directory, DeriveMagnitude, FieldSpec, RollupParams};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::RollupArgs) -> Result<i32> {
    let derive = match args.magnitude.trim() {
        "" => None,
        text => {
            let parts: Vec<&str> = text.split(',').map(str::trim).collect();
            ensure!(parts.len() == 3, "--magnitude takes 'X,Y,NAME', got '{text}'");
            Some(DeriveMagnitude {
                x: parts[0].to_string(),
                y: parts[1].to_string(),
                name: parts[2].to_string(),
            })
        }
    };

    let code_col = match args.mapping_code_col.trim() {
        "" => None,
        name => Some(name.to_string()),
    };

    let params = RollupParams {
        zones_dir: args.zones_dir.clone(),
        suffix: args.suffix.clone(),
        data_zone_col: args.zone_col.clone(),
        mapping_file: args.mapping.clone(),
        mapping_zone_col: args.mapping_zone_col.clone(),
        mapping_parent_col: args.mapping_parent_col.clone(),
        mapping_code_col: code_col,
        population_file: args.population.clone(),
        population_zone_col: args.population_zone_col.clone(),
        year: args.year,
        projected: args.projected,
        spec: FieldSpec {
            fields: args.fields.clone(),
            precisions: args.precisions.clone(),
            derive,
        },
        infix: args.infix.clone(),
        out_dir: args.out_dir.clone(),
        force: args.force,
        verbose: cli.verbose,
    };

    let written = rollup_directory(&params)?;
    println!("[rollup] {} parent files written to {}", written.len(), args.out_dir.display());

    Ok(0)
}

use anyhow::Result;
use gridzone::{aggregate_years, AggregateParams};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::AggregateArgs) -> Result<i32> {
    let params = AggregateParams {
        rasters: args.rasters.clone(),
        years: args.years.clone(),
        zones_file: args.zones.clone(),
        zone_id_field: args.id_field.clone(),
        region: args.region.clone(),
        scenario: args.scenario.clone(),
        field: args.field.clone(),
        cache: args.cache.clone(),
        drop_nan: args.drop_nan,
        out_dir: args.out_dir.clone(),
        suffix: args.suffix.clone(),
        jobs: args.jobs,
        force: args.force,
        verbose: cli.verbose,
    };

    let report = aggregate_years(&params)?;
    println!(
        "[aggregate] {} of {} years written to {}",
        report.units.len() - report.failed(),
        report.units.len(),
        args.out_dir.display()
    );
    for unit in report.units.iter().filter(|u| !u.ok) {
        eprintln!(
            "[aggregate] {} failed: {}",
            unit.label,
            unit.error.as_deref().unwrap_or("unknown")
        );
    }

    Ok(report.exit_code())
}

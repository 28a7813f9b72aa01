use anyhow::Result;
use gridzone::{redistribute_hours, TimeseriesParams};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::TimeseriesArgs) -> Result<i32> {
    let params = TimeseriesParams {
        input_dir: args.input_dir.clone(),
        zones_file: args.zones.clone(),
        zone_id_field: args.id_field.clone(),
        cache: args.cache.clone(),
        fields: args.fields.clone(),
        precisions: args.precisions.clone(),
        out_dir: args.out_dir.clone(),
        suffix: args.suffix.clone(),
        jobs: args.jobs,
        force: args.force,
        verbose: cli.verbose,
    };

    let report = redistribute_hours(&params)?;
    println!(
        "[timeseries] {} of {} hours written to {}",
        report.units.len() - report.failed(),
        report.units.len(),
        args.out_dir.display()
    );
    for unit in report.units.iter().filter(|u| !u.ok) {
        eprintln!(
            "[timeseries] {} failed: {}",
            unit.label,
            unit.error.as_deref().unwrap_or("unknown")
        );
    }

    Ok(report.exit_code())
}

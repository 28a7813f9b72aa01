use anyhow::Result;
use gridzone::fill_missing_hours;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::FillMissingArgs) -> Result<i32> {
    let missing = fill_missing_hours(
        &args.dir,
        &args.start,
        &args.end,
        &args.suffix,
        &args.zone_col,
        args.force,
    )?;

    if missing.is_empty() {
        println!("[fill-missing] no gaps between {} and {}", args.start, args.end);
    } else {
        println!(
            "[fill-missing] {} placeholder files written to {}",
            missing.len(),
            args.dir.display()
        );
    }

    Ok(0)
}

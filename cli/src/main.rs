mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{aggregate, fill_missing, list, rollup, timeseries, weights};

pub fn run() -> anyhow::Result<i32> {
    use clap::Parser;

    let cli = Cli::parse();
    match &cli.command {
        Commands::Weights(args) => weights::run(&cli, args),
        Commands::Aggregate(args) => aggregate::run(&cli, args),
        Commands::Timeseries(args) => timeseries::run(&cli, args),
        Commands::Rollup(args) => rollup::run(&cli, args),
        Commands::FillMissing(args) => fill_missing::run(&cli, args),
        Commands::List(args) => list::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> {
    let code = run()?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

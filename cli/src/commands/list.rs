use anyhow::Result;
use gridzone::Component;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::ListArgs) -> Result<i32> {
    let components = match &args.asset {
        Some(asset) => Component::related(asset),
        None => Component::ALL.to_vec(),
    };

    for component in &components {
        println!(
            "{:<13} {:<5} -> {:<6} {}",
            component.name(),
            component.source_model(),
            component.target_model(),
            component.description()
        );
    }

    Ok(0)
}

use std::path::PathBuf;

use anyhow::Result;
use gridzone::{validate_list_order, weights, Crs, Grid, ZoneSet};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::WeightsArgs) -> Result<i32> {
    let caches: Vec<PathBuf> = if args.caches.is_empty() {
        let out_dir = args.out_dir.clone().unwrap_or(".".into());
        args.rasters
            .iter()
            .map(|raster| {
                let stem = raster.file_stem().and_then(|s| s.to_str()).unwrap_or("grid");
                out_dir.join(format!("{stem}_area_weights.csv"))
            })
            .collect()
    } else {
        validate_list_order(&args.rasters, &args.caches)?;
        args.caches.clone()
    };

    let mut zones = ZoneSet::from_shapefile(&args.zones, &args.id_field, None)?;
    println!("[weights] {} zones from {}", zones.len(), args.zones.display());

    for (raster, cache) in args.rasters.iter().zip(&caches) {
        let grid = Grid::from_geotiff(raster)?;
        if !matches!(grid.crs(), Crs::Unknown)
            && !matches!(zones.crs(), Crs::Unknown)
            && !zones.crs().matches(grid.crs())
        {
            let target = grid.crs().clone();
            println!("[weights] reprojecting zones to {target}");
            zones.reproject_to(&target)?;
        }

        let table = weights::build(&grid, &zones, args.drop_nan, cli.verbose)?;
        weights::cache::save(&table, cache, args.force)?;
        println!(
            "[weights] {} -> {} ({} records)",
            raster.display(),
            cache.display(),
            table.len()
        );
    }

    Ok(0)
}

use std::path::PathBuf;

/// Grid-to-zone redistribution CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "gridzone", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Build and persist weight caches for raster/zone pairs
    Weights(WeightsArgs),

    /// Aggregate yearly rasters to zones as conservative sums
    Aggregate(AggregateArgs),

    /// Redistribute hourly cell tables to zones as weighted means
    Timeseries(TimeseriesArgs),

    /// Roll zone series up to parent groups, weighted by population
    Rollup(RollupArgs),

    /// Audit an hourly output directory and backfill missing stamps
    FillMissing(FillMissingArgs),

    /// List the registered components
    List(ListArgs),
}

#[derive(clap::Args, Debug)]
pub struct WeightsArgs {
    /// Rasters to overlay, one cache per raster
    #[arg(long, required = true, num_args = 1.., value_hint = clap::ValueHint::FilePath)]
    pub rasters: Vec<PathBuf>,

    /// Zone shapefile (.shp with .dbf sidecar)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub zones: PathBuf,

    /// Attribute field holding the zone id
    #[arg(long, default_value = "GEOID")]
    pub id_field: String,

    /// Cache paths paired with --rasters; derived from raster stems if omitted
    #[arg(long, num_args = 1.., value_hint = clap::ValueHint::FilePath)]
    pub caches: Vec<PathBuf>,

    /// Directory for derived cache names, defaults to "."
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub out_dir: Option<PathBuf>,

    /// Skip NaN-valued cells instead of carrying them
    #[arg(long)]
    pub drop_nan: bool,

    /// Overwrite existing output files
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug)]
pub struct AggregateArgs {
    /// One single-band raster per year, same grid geometry throughout
    #[arg(long, required = true, num_args = 1.., value_hint = clap::ValueHint::FilePath)]
    pub rasters: Vec<PathBuf>,

    /// Years paired with --rasters
    #[arg(long, required = true, num_args = 1..)]
    pub years: Vec<i32>,

    /// Zone shapefile (.shp with .dbf sidecar)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub zones: PathBuf,

    /// Attribute field holding the zone id
    #[arg(long, default_value = "GEOID")]
    pub id_field: String,

    /// Region name written into output file names
    #[arg(long)]
    pub region: Option<String>,

    /// Scenario name written into output file names
    #[arg(long)]
    pub scenario: Option<String>,

    /// Value column name in the outputs
    #[arg(long, default_value = "n_population")]
    pub field: String,

    /// Trailing part of per-year output names
    #[arg(long, default_value = "county_population_sum")]
    pub suffix: String,

    /// Reuse this weight cache instead of running the overlay
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub cache: Option<PathBuf>,

    /// Skip NaN-valued cells instead of carrying them
    #[arg(long)]
    pub drop_nan: bool,

    /// Output directory (must exist)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub out_dir: PathBuf,

    /// Worker threads, 0 sizes to the machine
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Overwrite existing output files
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug)]
pub struct TimeseriesArgs {
    /// Directory of stamped hourly cell tables
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub input_dir: PathBuf,

    /// Zone shapefile (.shp with .dbf sidecar)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub zones: PathBuf,

    /// Attribute field holding the zone id
    #[arg(long, default_value = "GEOID")]
    pub id_field: String,

    /// Weight cache built beforehand for this grid geometry
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub cache: PathBuf,

    /// Value columns to redistribute
    #[arg(long, num_args = 1.., default_values_t = ["T2".to_string(), "Q2".to_string(), "U10".to_string(), "V10".to_string(), "SWDOWN".to_string(), "GLW".to_string()])]
    pub fields: Vec<String>,

    /// Decimal places paired with --fields
    #[arg(long, num_args = 1.., default_values_t = [2u32, 5, 2, 2, 2, 2])]
    pub precisions: Vec<u32>,

    /// Output directory, created if missing
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub out_dir: PathBuf,

    /// Trailing part of per-hour output names
    #[arg(long, default_value = "_County_Mean_Meteorology")]
    pub suffix: String,

    /// Worker threads, 0 sizes to the machine
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Overwrite existing output files
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug)]
pub struct RollupArgs {
    /// Directory of stamped hourly zone tables for one year
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub zones_dir: PathBuf,

    /// Zone id column in the hourly tables
    #[arg(long, default_value = "FIPS")]
    pub zone_col: String,

    /// CSV mapping zones to parent groups
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub mapping: PathBuf,

    /// Zone id column in the mapping file
    #[arg(long, default_value = "county_fips")]
    pub mapping_zone_col: String,

    /// Parent id column in the mapping file
    #[arg(long, default_value = "ba_number")]
    pub mapping_parent_col: String,

    /// Parent short-code column in the mapping file; empty falls back to ids
    #[arg(long, default_value = "ba_abbreviation")]
    pub mapping_code_col: String,

    /// CSV of zone populations by year
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub population: PathBuf,

    /// Zone id column in the population file
    #[arg(long, default_value = "county_FIPS")]
    pub population_zone_col: String,

    /// Year of the hourly data
    #[arg(long)]
    pub year: i32,

    /// Population file holds projections under plain year columns
    #[arg(long)]
    pub projected: bool,

    /// Value columns to roll up
    #[arg(long, num_args = 1.., default_values_t = ["T2".to_string(), "Q2".to_string(), "U10".to_string(), "V10".to_string(), "SWDOWN".to_string(), "GLW".to_string()])]
    pub fields: Vec<String>,

    /// Decimal places paired with --fields
    #[arg(long, num_args = 1.., default_values_t = [2u32, 5, 2, 2, 2, 2])]
    pub precisions: Vec<u32>,

    /// Replace a vector pair with its magnitude, as "X,Y,NAME"
    #[arg(long, value_name = "X,Y,NAME", default_value = "U10,V10,WSPD")]
    pub magnitude: String,

    /// Middle part of per-parent output names
    #[arg(long, default_value = "WRF_Hourly_Mean_Meteorology")]
    pub infix: String,

    /// Trailing part of the hourly input names
    #[arg(long, default_value = "_County_Mean_Meteorology")]
    pub suffix: String,

    /// Output directory, created if missing
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub out_dir: PathBuf,

    /// Overwrite existing output files
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug)]
pub struct FillMissingArgs {
    /// Directory of stamped hourly zone tables
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub dir: PathBuf,

    /// Start of the expected range (ISO 8601; bare dates begin at 01:00)
    #[arg(long)]
    pub start: String,

    /// End of the expected range (ISO 8601; bare dates run through midnight)
    #[arg(long)]
    pub end: String,

    /// Trailing part of the hourly file names
    #[arg(long, default_value = "_County_Mean_Meteorology")]
    pub suffix: String,

    /// Zone id column copied into placeholder files
    #[arg(long, default_value = "FIPS")]
    pub zone_col: String,

    /// Overwrite existing output files
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only list components that touch this asset
    #[arg(long)]
    pub asset: Option<String>,
}

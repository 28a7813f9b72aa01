//! Parallel fan-out over independent time units, and the directory-level
//! drivers built on it.
//!
//! Units share only the immutable zone set and weight table; each one reads
//! its own input and writes its own output, so the pool needs no locking. A
//! unit that fails or panics becomes a failure record while its siblings
//! keep going.

use std::any::Any;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;

use ahash::AHashSet;
use anyhow::{bail, ensure, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, Timelike, Utc};
use polars::prelude::{
    col, Column, DataFrame, IntoLazy, JoinArgs, JoinCoalesce, JoinType, SortMultipleOptions,
};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;

use crate::aggregate::{balance, mean_by_zone, sum_by_zone, BalanceReport, FieldSet};
use crate::common;
use crate::common::validate::{validate_slug, validate_year};
use crate::geom::Crs;
use crate::grid::Grid;
use crate::weights::{self, cache};
use crate::zone::ZoneSet;

/// One independent work item: a year or hour label plus its input file.
#[derive(Debug, Clone)]
pub struct Unit {
    pub label: String,
    pub input: PathBuf,
}

/// Outcome of a single unit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub label: String,
    pub ok: bool,
    pub output: Option<PathBuf>,
    pub error: Option<String>,
    pub balance: Option<BalanceReport>,
}

/// Outcome of a whole batch, serialized to `summary.json` next to the
/// outputs.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started: String,
    pub elapsed_seconds: f64,
    pub units: Vec<UnitReport>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.units.iter().filter(|u| !u.ok).count()
    }

    /// Nonzero when any unit failed, for the process exit status.
    pub fn exit_code(&self) -> i32 {
        if self.failed() > 0 { 1 } else { 0 }
    }

    /// Write `summary.json` into `dir`. Always overwrites; the summary
    /// describes this run, not a dataset.
    pub fn write_summary(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join("summary.json");
        let body = serde_json::to_string_pretty(self)?;
        fs::write(&path, body)
            .with_context(|| format!("Failed to write batch summary: {}", path.display()))?;
        Ok(path)
    }
}

/// Run every unit on a fixed-size pool. `jobs = 0` sizes the pool to the
/// machine. Panics inside a task are caught and recorded as that unit's
/// failure.
pub fn run<F>(units: &[Unit], jobs: usize, task: F) -> Result<BatchReport>
where
    F: Fn(&Unit) -> Result<(PathBuf, Option<BalanceReport>)> + Sync,
{
    let started = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let clock = Instant::now();
    let pool = ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Failed to build worker pool")?;

    let reports: Vec<UnitReport> = pool.install(|| {
        units
            .par_iter()
            .map(|unit| match catch_unwind(AssertUnwindSafe(|| task(unit))) {
                Ok(Ok((output, balance))) => UnitReport {
                    label: unit.label.clone(),
                    ok: true,
                    output: Some(output),
                    error: None,
                    balance,
                },
                Ok(Err(err)) => UnitReport {
                    label: unit.label.clone(),
                    ok: false,
                    output: None,
                    error: Some(format!("{err:#}")),
                    balance: None,
                },
                Err(panic) => UnitReport {
                    label: unit.label.clone(),
                    ok: false,
                    output: None,
                    error: Some(panic_message(panic.as_ref())),
                    balance: None,
                },
            })
            .collect()
    });

    Ok(BatchReport { started, elapsed_seconds: clock.elapsed().as_secs_f64(), units: reports })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("task panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("task panicked: {s}")
    } else {
        "task panicked".to_string()
    }
}

/// Merge labeled per-unit frames into one wide table keyed by zone id.
///
/// The first frame seeds the table and later frames full-outer-join onto it,
/// so a zone present in any unit keeps its row. With a single value column
/// per unit the merged column is named by the label alone; with several, by
/// `{field}_{label}`. Rows come out sorted by zone id, so the merge is
/// deterministic regardless of unit completion order.
pub fn merge_by_zone(frames: &[(String, DataFrame)]) -> Result<DataFrame> {
    ensure!(!frames.is_empty(), "nothing to merge");

    let mut renamed = Vec::with_capacity(frames.len());
    for (label, df) in frames {
        let mut df = df.clone();
        let value_cols: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .filter(|name| name != "zone_id")
            .collect();
        ensure!(!value_cols.is_empty(), "unit '{label}' has no value columns");
        for name in &value_cols {
            let new = if value_cols.len() == 1 {
                label.clone()
            } else {
                format!("{name}_{label}")
            };
            df.rename(name, new.into())?;
        }
        renamed.push(df);
    }

    let mut merged = renamed[0].clone().lazy();
    for df in &renamed[1..] {
        merged = merged.join(
            df.clone().lazy(),
            [col("zone_id")],
            [col("zone_id")],
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        );
    }
    Ok(merged.sort(["zone_id"], SortMultipleOptions::default()).collect()?)
}

// ---------------------------------------------------------------------------
// year flow: conservative sums of one raster per year

/// Inputs for a per-year batch over one region's rasters.
#[derive(Debug, Clone)]
pub struct AggregateParams {
    /// One single-band raster per year, same grid geometry throughout.
    pub rasters: Vec<PathBuf>,
    /// Years paired with `rasters`, used for output naming and labels.
    pub years: Vec<i32>,
    pub zones_file: PathBuf,
    pub zone_id_field: String,
    /// Region name written into file names (validated to a slug).
    pub region: Option<String>,
    pub scenario: Option<String>,
    /// Value column name in the per-year outputs.
    pub field: String,
    /// Reuse this weight cache instead of running the overlay.
    pub cache: Option<PathBuf>,
    pub drop_nan: bool,
    pub out_dir: PathBuf,
    /// Trailing part of per-year output names.
    pub suffix: String,
    pub jobs: usize,
    pub force: bool,
    pub verbose: u8,
}

/// Aggregate each year's raster to zones, balance it, write per-year files
/// plus the merged wide table, and record everything in `summary.json`.
pub fn aggregate_years(params: &AggregateParams) -> Result<BatchReport> {
    ensure!(!params.rasters.is_empty(), "no rasters to process");
    ensure!(
        params.rasters.len() == params.years.len(),
        "got {} rasters but {} years",
        params.rasters.len(),
        params.years.len()
    );
    for year in &params.years {
        validate_year(*year)?;
    }
    let region = validate_slug(params.region.as_deref())?;
    let scenario = validate_slug(params.scenario.as_deref())?;
    common::require_dir_exists(&params.out_dir)?;
    for raster in &params.rasters {
        common::require_file_exists(raster)?;
    }

    // Everything shared is prepared up front, single-threaded: the zone set,
    // and the weight cache write (single writer, before fan-out).
    let first = Grid::from_geotiff(&params.rasters[0])?;
    let mut zones = ZoneSet::from_shapefile(&params.zones_file, &params.zone_id_field, None)?;
    let needs_reproject = !matches!(first.crs(), Crs::Unknown)
        && !matches!(zones.crs(), Crs::Unknown)
        && !zones.crs().matches(first.crs());
    if needs_reproject {
        let target = first.crs().clone();
        zones.reproject_to(&target)?;
    }

    let weights = match &params.cache {
        Some(path) => {
            if params.verbose > 0 {
                eprintln!("[batch] reusing weights cache {}", path.display());
            }
            cache::load(path)?
        }
        None => {
            let table = weights::build(&first, &zones, params.drop_nan, params.verbose)?;
            let path = params.out_dir.join(format!("{region}_area_weights.csv"));
            cache::save(&table, &path, params.force)?;
            if params.verbose > 0 {
                eprintln!("[batch] wrote weights cache {}", path.display());
            }
            table
        }
    };

    let units: Vec<Unit> = params
        .years
        .iter()
        .zip(&params.rasters)
        .map(|(year, raster)| Unit { label: year.to_string(), input: raster.clone() })
        .collect();

    let (dims, x_res, y_res) = (first.dims(), first.x_res(), first.y_res());
    let report = run(&units, params.jobs, |unit| {
        let grid = Grid::from_geotiff(&unit.input)?;
        ensure!(
            grid.dims() == dims && grid.x_res() == x_res && grid.y_res() == y_res,
            "raster {} does not share the batch grid geometry",
            unit.input.display()
        );
        let fields = FieldSet::from_grid(&params.field, &grid);
        let mut df = sum_by_zone(&weights, &fields, &zones)?;
        let expected = [(params.field.as_str(), fields.considered_total(0))];
        let balance_report = balance(&mut df, &expected, &unit.label)?;

        let path = params
            .out_dir
            .join(format!("{scenario}_{region}_{}_{}.csv", unit.label, params.suffix));
        common::write_table_atomic(&mut df, &path, params.force)?;
        Ok((path, Some(balance_report)))
    })?;

    // merge whatever succeeded into the wide by-year table
    let mut frames = Vec::new();
    for unit in report.units.iter().filter(|u| u.ok) {
        if let Some(path) = &unit.output {
            frames.push((unit.label.clone(), common::read_table(path, &["zone_id"])?));
        }
    }
    if !frames.is_empty() {
        let merged_path = params
            .out_dir
            .join(format!("{scenario}_{region}_{}_by_year.csv", params.suffix));
        let mut merged = merge_by_zone(&frames)?;
        common::write_table_atomic(&mut merged, &merged_path, params.force)?;
    }

    report.write_summary(&params.out_dir)?;
    if params.verbose > 0 {
        eprintln!(
            "[batch] {} of {} years done in {:.1}s",
            report.units.len() - report.failed(),
            report.units.len(),
            report.elapsed_seconds
        );
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// hour flow: weighted means of per-hour cell tables

/// Inputs for a per-hour batch over a directory of cell-value tables.
#[derive(Debug, Clone)]
pub struct TimeseriesParams {
    /// Directory of hourly CSVs, one row per cell in grid enumeration order,
    /// stamped `%Y_%m_%d_%H` at the front of the file name.
    pub input_dir: PathBuf,
    pub zones_file: PathBuf,
    pub zone_id_field: String,
    /// Weight cache built beforehand for this grid geometry. Required: hour
    /// tables carry no geometry of their own.
    pub cache: PathBuf,
    pub fields: Vec<String>,
    pub precisions: Vec<u32>,
    pub out_dir: PathBuf,
    /// Trailing part of per-hour output names.
    pub suffix: String,
    pub jobs: usize,
    pub force: bool,
    pub verbose: u8,
}

/// Compute per-zone weighted means for every stamped hour file and write one
/// output per stamp.
pub fn redistribute_hours(params: &TimeseriesParams) -> Result<BatchReport> {
    ensure!(
        params.fields.len() == params.precisions.len(),
        "got {} fields but {} precisions",
        params.fields.len(),
        params.precisions.len()
    );
    common::require_dir_exists(&params.input_dir)?;
    common::ensure_dir_exists(&params.out_dir)?;

    let zones = ZoneSet::from_shapefile(&params.zones_file, &params.zone_id_field, None)?;
    let share = cache::load(&params.cache)?.zone_share();
    let max_cell = share.max_cell_index().unwrap_or(0);

    let mut units = Vec::new();
    for entry in fs::read_dir(&params.input_dir)
        .with_context(|| format!("Failed to read directory: {}", params.input_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(".csv") {
            continue;
        }
        if let Some(stamp) = parse_hour_stamp(&name) {
            units.push(Unit { label: format_hour_stamp(stamp), input: entry.path() });
        }
    }
    units.sort_by(|a, b| a.label.cmp(&b.label));
    ensure!(!units.is_empty(), "no stamped hour files in {}", params.input_dir.display());
    if params.verbose > 0 {
        eprintln!("[batch] {} hour files against {} zones", units.len(), zones.len());
    }

    let field_names: Vec<&str> = params.fields.iter().map(String::as_str).collect();
    let precisions: Vec<(&str, u32)> = params
        .fields
        .iter()
        .map(String::as_str)
        .zip(params.precisions.iter().copied())
        .collect();
    let report = run(&units, params.jobs, |unit| {
        let df = common::read_csv(&unit.input)?;
        ensure!(
            df.height() > max_cell as usize,
            "{} has {} rows but the weight table references cell {max_cell}",
            unit.input.display(),
            df.height()
        );
        let fields = FieldSet::from_frame(&df, &field_names)?;
        let mut means = mean_by_zone(&share, &fields, &zones, &precisions)?;
        let path = params.out_dir.join(format!("{}{}.csv", unit.label, params.suffix));
        common::write_table_atomic(&mut means, &path, params.force)?;
        Ok((path, None))
    })?;

    report.write_summary(&params.out_dir)?;
    if params.verbose > 0 {
        eprintln!(
            "[batch] {} of {} hours done in {:.1}s",
            report.units.len() - report.failed(),
            report.units.len(),
            report.elapsed_seconds
        );
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// hour stamps

pub(crate) fn format_hour_stamp(stamp: NaiveDateTime) -> String {
    stamp.format("%Y_%m_%d_%H_UTC").to_string()
}

/// Parse the `%Y_%m_%d_%H` stamp off the front of a file name; anything may
/// follow it.
pub(crate) fn parse_hour_stamp(name: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(name.get(0..10)?, "%Y_%m_%d").ok()?;
    if name.as_bytes().get(10) != Some(&b'_') {
        return None;
    }
    let hour: u32 = name.get(11..13)?.parse().ok()?;
    date.and_hms_opt(hour, 0, 0)
}

// ---------------------------------------------------------------------------
// missing-hour audit

/// Audit a timeseries output directory against an expected hourly range,
/// writing a NaN placeholder file for every missing stamp plus a text
/// summary of what was missing.
///
/// `start` and `end` are ISO 8601; a bare start date begins at 01:00 and a
/// bare end date runs through the following midnight. The placeholder rows
/// copy the zone column of the earliest present file, with every other
/// column set to NaN. Returns the missing stamps.
pub fn fill_missing_hours(
    dir: &Path,
    start: &str,
    end: &str,
    suffix: &str,
    zone_col: &str,
    force: bool,
) -> Result<Vec<NaiveDateTime>> {
    common::require_dir_exists(dir)?;
    let start_at = parse_iso_hour(start, BareDate::StartsAtOne)?;
    let end_at = parse_iso_hour(end, BareDate::RunsThroughMidnight)?;

    let tail = format!("{suffix}.csv");
    let mut files: Vec<String> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(&tail))
        .collect();
    files.sort();
    ensure!(!files.is_empty(), "no files matching '*{tail}' in {}", dir.display());

    let present: AHashSet<NaiveDateTime> =
        files.iter().filter_map(|name| parse_hour_stamp(name)).collect();
    let mut missing = Vec::new();
    let mut at = start_at;
    while at <= end_at {
        if !present.contains(&at) {
            missing.push(at);
        }
        at += chrono::Duration::hours(1);
    }

    // template: the earliest file with its value columns blanked out
    let template = common::read_csv_with_string_cols(&dir.join(&files[0]), &[zone_col])?;
    let mut columns = Vec::with_capacity(template.width());
    for column in template.get_columns() {
        if column.name().as_str() == zone_col {
            columns.push(column.clone());
        } else {
            columns.push(Column::new(column.name().clone(), vec![f64::NAN; template.height()]));
        }
    }
    let mut placeholder = DataFrame::new(columns)?;

    for stamp in &missing {
        eprintln!("Missing data: {}.", stamp.format("%Y-%m-%d %H:%M:%S"));
        let path = dir.join(format!("{}{tail}", format_hour_stamp(*stamp)));
        common::write_table_atomic(&mut placeholder, &path, force)?;
    }

    let summary = dir.join(format!("missing_data_{start}_to_{end}.txt"));
    let mut pending = common::begin_write(&summary, true)?;
    {
        use std::io::Write;
        writeln!(pending, "Missing Data")?;
        for stamp in &missing {
            writeln!(pending, "{}", stamp.format("%Y-%m-%d %H:%M:%S"))?;
        }
    }
    common::commit_write(pending)?;

    Ok(missing)
}

enum BareDate {
    StartsAtOne,
    RunsThroughMidnight,
}

fn parse_iso_hour(text: &str, bare: BareDate) -> Result<NaiveDateTime> {
    const MESSAGE: &str = "Start and end must be provided in ISO8601 format.";

    if text.len() == 10 {
        let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().context(MESSAGE)?;
        return match bare {
            BareDate::StartsAtOne => date.and_hms_opt(1, 0, 0).context(MESSAGE),
            BareDate::RunsThroughMidnight => {
                (date + chrono::Duration::days(1)).and_hms_opt(0, 0, 0).context(MESSAGE)
            }
        };
    }
    // date plus bare hour, e.g. 2019-01-01T05
    if text.len() == 13 && (text.as_bytes()[10] == b'T' || text.as_bytes()[10] == b' ') {
        let date = NaiveDate::parse_from_str(&text[0..10], "%Y-%m-%d").ok().context(MESSAGE)?;
        let hour: u32 = text[11..13].parse().ok().context(MESSAGE)?;
        return date.and_hms_opt(hour, 0, 0).context(MESSAGE);
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, format) {
            // minutes and seconds are truncated to the hour
            return t.date().and_hms_opt(t.hour(), 0, 0).context(MESSAGE);
        }
    }
    bail!(MESSAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn failing_units_do_not_abort_siblings() {
        let units = vec![
            Unit { label: "2019".into(), input: PathBuf::from("a") },
            Unit { label: "2020".into(), input: PathBuf::from("b") },
            Unit { label: "2021".into(), input: PathBuf::from("c") },
        ];
        let report = run(&units, 2, |unit| match unit.label.as_str() {
            "2020" => Err(anyhow!("broken input")),
            "2021" => panic!("surprise"),
            _ => Ok((PathBuf::from(format!("{}.csv", unit.label)), None)),
        })
        .unwrap();

        assert_eq!(report.units.len(), 3);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.exit_code(), 1);
        let by_label = |label: &str| report.units.iter().find(|u| u.label == label).unwrap();
        assert!(by_label("2019").ok);
        assert!(by_label("2020").error.as_deref().unwrap().contains("broken input"));
        assert!(by_label("2021").error.as_deref().unwrap().contains("surprise"));
    }

    #[test]
    fn all_ok_batch_exits_zero() {
        let units = vec![Unit { label: "2019".into(), input: PathBuf::from("a") }];
        let report = run(&units, 1, |_| Ok((PathBuf::from("out.csv"), None))).unwrap();
        assert_eq!(report.exit_code(), 0);
        assert!(report.units[0].output.as_deref() == Some(Path::new("out.csv")));
    }

    #[test]
    fn two_unit_merge_keeps_every_zone() {
        let a = DataFrame::new(vec![
            Column::new("zone_id".into(), vec!["A", "B"]),
            Column::new("pop".into(), vec![1.0, 2.0]),
        ])
        .unwrap();
        let b = DataFrame::new(vec![
            Column::new("zone_id".into(), vec!["B", "C"]),
            Column::new("pop".into(), vec![3.0, 4.0]),
        ])
        .unwrap();

        let merged =
            merge_by_zone(&[("2020".to_string(), a), ("2021".to_string(), b)]).unwrap();
        assert_eq!(merged.shape(), (3, 3));
        let ids: Vec<&str> =
            merged.column("zone_id").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        // single value column per unit is named by the label alone
        let y2020 = merged.column("2020").unwrap().f64().unwrap();
        assert_eq!(y2020.get(0), Some(1.0));
        assert_eq!(y2020.get(2), None); // C only exists in 2021
        let y2021 = merged.column("2021").unwrap().f64().unwrap();
        assert_eq!(y2021.get(1), Some(3.0));
    }

    #[test]
    fn multi_field_merge_suffixes_by_label() {
        let a = DataFrame::new(vec![
            Column::new("zone_id".into(), vec!["A"]),
            Column::new("pop".into(), vec![1.0]),
            Column::new("area".into(), vec![9.0]),
        ])
        .unwrap();
        let merged = merge_by_zone(&[("2020".to_string(), a)]).unwrap();
        assert!(merged.column("pop_2020").is_ok());
        assert!(merged.column("area_2020").is_ok());
    }

    #[test]
    fn stamps_parse_off_file_names() {
        let stamp = parse_hour_stamp("2019_01_01_05_UTC_County_Mean_Meteorology.csv").unwrap();
        assert_eq!(format_hour_stamp(stamp), "2019_01_01_05_UTC");
        assert!(parse_hour_stamp("notastamp.csv").is_none());
        assert!(parse_hour_stamp("2019_13_01_05_UTC.csv").is_none());
        assert!(parse_hour_stamp("2019_01_01_99_UTC.csv").is_none());
    }

    fn seed_hour_files(dir: &Path) {
        for stamp in ["2019_01_01_00", "2019_01_01_02"] {
            fs::write(
                dir.join(format!("{stamp}_UTC_County_Mean_Meteorology.csv")),
                "FIPS,T2\n01001,280.0\n01003,281.5\n",
            )
            .unwrap();
        }
    }

    #[test]
    fn missing_hours_get_nan_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        seed_hour_files(dir.path());

        let missing = fill_missing_hours(
            dir.path(),
            "2019-01-01T00",
            "2019-01-01T03",
            "_County_Mean_Meteorology",
            "FIPS",
            false,
        )
        .unwrap();
        let labels: Vec<String> = missing.iter().map(|m| format_hour_stamp(*m)).collect();
        assert_eq!(labels, vec!["2019_01_01_01_UTC", "2019_01_01_03_UTC"]);

        let body = fs::read_to_string(
            dir.path().join("2019_01_01_01_UTC_County_Mean_Meteorology.csv"),
        )
        .unwrap();
        assert!(body.starts_with("FIPS,T2"));
        assert!(body.contains("01001"));
        assert!(body.contains("NaN"));

        let summary = fs::read_to_string(
            dir.path().join("missing_data_2019-01-01T00_to_2019-01-01T03.txt"),
        )
        .unwrap();
        assert!(summary.starts_with("Missing Data"));
        assert!(summary.contains("2019-01-01 01:00:00"));
        assert!(summary.contains("2019-01-01 03:00:00"));
    }

    #[test]
    fn bare_dates_cover_one_through_following_midnight() {
        let dir = tempfile::tempdir().unwrap();
        seed_hour_files(dir.path());

        let missing = fill_missing_hours(
            dir.path(),
            "2019-01-01",
            "2019-01-01",
            "_County_Mean_Meteorology",
            "FIPS",
            false,
        )
        .unwrap();
        // hours 01..=23 of the day plus the following midnight, minus the
        // present 02:00 file
        assert_eq!(missing.len(), 23);
        assert_eq!(format_hour_stamp(missing[0]), "2019_01_01_01_UTC");
        assert_eq!(format_hour_stamp(missing[22]), "2019_01_02_00_UTC");
    }

    #[test]
    fn malformed_range_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        seed_hour_files(dir.path());
        let err = fill_missing_hours(
            dir.path(),
            "January 1st",
            "2019-01-02",
            "_County_Mean_Meteorology",
            "FIPS",
            false,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("ISO8601"));
    }
}

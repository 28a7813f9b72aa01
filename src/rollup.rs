//! Population-weighted rollup of per-zone outputs to parent zones.
//!
//! The inputs are one file per hour of zone-level values, a zone-to-parent
//! mapping, and a population table. Each zone's contribution to its parent is
//! its share of the parent's population, so the result is a population-
//! weighted mean per parent per timestamp.

use std::path::{Path, PathBuf};

use ahash::AHashMap;
use anyhow::{bail, ensure, Context, Result};
use chrono::{Datelike, NaiveDateTime};
use polars::prelude::{
    col, ChunkApply, Column, DataFrame, DataType, Expr, IntoLazy, IntoSeries, JoinArgs, JoinType,
    SortMultipleOptions,
};

use crate::aggregate::round_to;
use crate::batch::parse_hour_stamp;
use crate::common;
use crate::common::validate::validate_year;
use crate::zone::{ParentMap, ZoneId};

/// Zone populations for one target year, however the source lays years out.
#[derive(Debug, Clone)]
pub struct PopulationTable {
    rows: Vec<(ZoneId, f64)>,
}

impl PopulationTable {
    /// Read a historical table with one `pop_YYYY` column per year. The
    /// target year is clamped to the file's span, and values are rounded to
    /// whole people.
    pub fn historical(path: &Path, zone_col: &str, year: i32) -> Result<Self> {
        let df = common::read_csv_with_string_cols(path, &[zone_col])?;
        let mut years: Vec<i32> = df
            .get_column_names()
            .iter()
            .filter_map(|name| name.as_str().strip_prefix("pop_")?.parse().ok())
            .collect();
        ensure!(!years.is_empty(), "no pop_YYYY columns in {}", path.display());
        years.sort_unstable();

        let target = year.clamp(years[0], years[years.len() - 1]);
        let column = df.column(&format!("pop_{target}"))?.cast(&DataType::Float64)?;
        Self::from_columns(df.column(zone_col)?.str()?, column.f64()?, |v| v.round())
    }

    /// Read a projected table laid out as one plain `YYYY` column per known
    /// year, linearly interpolating between the years bracketing the target.
    /// Targets outside the span clamp to the nearest known year. Non-year
    /// columns are ignored.
    pub fn projected(path: &Path, zone_col: &str, year: i32) -> Result<Self> {
        let df = common::read_csv_with_string_cols(path, &[zone_col])?;
        let mut years: Vec<i32> = df
            .get_column_names()
            .iter()
            .filter_map(|name| name.as_str().parse().ok())
            .filter(|y| (1000..10_000).contains(y))
            .collect();
        ensure!(!years.is_empty(), "no year columns in {}", path.display());
        years.sort_unstable();

        let target = year.clamp(years[0], years[years.len() - 1]);
        if years.contains(&target) {
            let column = df.column(&target.to_string())?.cast(&DataType::Float64)?;
            return Self::from_columns(df.column(zone_col)?.str()?, column.f64()?, |v| v.round());
        }

        // target falls strictly between two known years
        let below = years.iter().copied().filter(|y| *y < target).max().unwrap_or(years[0]);
        let above =
            years.iter().copied().filter(|y| *y > target).min().unwrap_or(years[years.len() - 1]);
        let t = (target - below) as f64 / (above - below) as f64;
        let lo = df.column(&below.to_string())?.cast(&DataType::Float64)?;
        let hi = df.column(&above.to_string())?.cast(&DataType::Float64)?;
        let (lo, hi) = (lo.f64()?, hi.f64()?);

        let zones = df.column(zone_col)?.str()?;
        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let Some(zone) = zones.get(i) else { continue };
            let value = match (lo.get(i), hi.get(i)) {
                (Some(a), Some(b)) => (a + (b - a) * t).round(),
                _ => f64::NAN,
            };
            rows.push((ZoneId::new(zone), value));
        }
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        ensure!(!rows.is_empty(), "population table contains no rows");
        Ok(Self { rows })
    }

    fn from_columns(
        zones: &polars::prelude::StringChunked,
        values: &polars::prelude::Float64Chunked,
        finish: impl Fn(f64) -> f64,
    ) -> Result<Self> {
        let mut rows = Vec::with_capacity(zones.len());
        for i in 0..zones.len() {
            let Some(zone) = zones.get(i) else { continue };
            let value = values.get(i).map(&finish).unwrap_or(f64::NAN);
            rows.push((ZoneId::new(zone), value));
        }
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        ensure!(!rows.is_empty(), "population table contains no rows");
        Ok(Self { rows })
    }

    #[inline] pub fn len(&self) -> usize { self.rows.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    #[inline] pub fn rows(&self) -> &[(ZoneId, f64)] { &self.rows }
}

/// Each zone's share of its parent's population.
///
/// Inner-join semantics throughout: zones without a parent mapping or without
/// a population are dropped here, not imputed, so they contribute nothing to
/// their parent's mean.
pub fn population_fractions(
    parents: &ParentMap,
    population: &PopulationTable,
) -> Result<DataFrame> {
    let mut parent_sums: AHashMap<&ZoneId, f64> = AHashMap::new();
    for (zone, pop) in population.rows() {
        if pop.is_nan() {
            continue;
        }
        if let Some(parent) = parents.get(zone) {
            *parent_sums.entry(&parent.id).or_insert(0.0) += pop;
        }
    }

    let mut zone_ids = Vec::new();
    let mut parent_ids = Vec::new();
    let mut parent_codes = Vec::new();
    let mut populations = Vec::new();
    let mut fractions = Vec::new();
    for (zone, pop) in population.rows() {
        if pop.is_nan() {
            continue;
        }
        let Some(parent) = parents.get(zone) else { continue };
        let fraction = pop / parent_sums.get(&parent.id).copied().unwrap_or(0.0);
        if !fraction.is_finite() {
            continue; // zero-population parent
        }
        zone_ids.push(zone.as_str());
        parent_ids.push(parent.id.as_str());
        parent_codes.push(parent.code.as_str());
        populations.push(*pop);
        fractions.push(fraction);
    }
    ensure!(!zone_ids.is_empty(), "no zones in the population table match the parent mapping");

    Ok(DataFrame::new(vec![
        Column::new("zone_id".into(), zone_ids),
        Column::new("parent_id".into(), parent_ids),
        Column::new("parent_code".into(), parent_codes),
        Column::new("population".into(), populations),
        Column::new("fraction".into(), fractions),
    ])?)
}

/// Replace two orthogonal vector components with their magnitude before
/// rollup, e.g. wind components with wind speed.
#[derive(Debug, Clone)]
pub struct DeriveMagnitude {
    pub x: String,
    pub y: String,
    pub name: String,
}

/// Which value columns roll up, and to how many decimals each rounds.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub fields: Vec<String>,
    pub precisions: Vec<u32>,
    pub derive: Option<DeriveMagnitude>,
}

/// Roll one year of zone rows up to parents.
///
/// `zones` must carry `zone_id`, `Time_UTC` and the requested value columns;
/// `fractions` comes from [`population_fractions`]. The derived magnitude is
/// applied exactly once, replacing its two source fields and carrying the
/// x-component's precision. Output rows are sorted by (parent, time), so
/// repeated runs are value-for-value identical.
pub fn rollup(zones: &DataFrame, fractions: &DataFrame, spec: &FieldSpec) -> Result<DataFrame> {
    ensure!(
        spec.fields.len() == spec.precisions.len(),
        "fields and precisions disagree in length ({} vs {})",
        spec.fields.len(),
        spec.precisions.len()
    );

    let mut zones = zones.clone();
    let mut fields = spec.fields.clone();
    let mut precisions = spec.precisions.clone();
    if let Some(derive) = &spec.derive {
        let present = zones.column(&derive.x).is_ok() && zones.column(&derive.y).is_ok();
        if present {
            if let Some(ix) = fields.iter().position(|f| *f == derive.x) {
                let xs: Vec<f64> = numeric_column(&zones, &derive.x)?;
                let ys: Vec<f64> = numeric_column(&zones, &derive.y)?;
                let magnitude: Vec<f64> =
                    xs.iter().zip(&ys).map(|(x, y)| (x * x + y * y).sqrt()).collect();
                zones.drop_in_place(&derive.x)?;
                zones.drop_in_place(&derive.y)?;
                zones.with_column(Column::new(derive.name.as_str().into(), magnitude))?;

                fields.remove(ix);
                let precision = precisions.remove(ix);
                if let Some(iy) = fields.iter().position(|f| *f == derive.y) {
                    fields.remove(iy);
                    precisions.remove(iy);
                }
                fields.push(derive.name.clone());
                precisions.push(precision);
            }
        }
    }

    let weighted: Vec<Expr> = fields
        .iter()
        .map(|f| (col(f.as_str()) * col("fraction")).sum().alias(f.as_str()))
        .collect();
    let mut grouped = zones
        .lazy()
        .join(
            fractions
                .clone()
                .lazy()
                .select([col("zone_id"), col("parent_id"), col("parent_code"), col("fraction")]),
            [col("zone_id")],
            [col("zone_id")],
            JoinArgs::new(JoinType::Inner),
        )
        .group_by([col("parent_id"), col("parent_code"), col("Time_UTC")])
        .agg(weighted)
        .sort(["parent_id", "Time_UTC"], SortMultipleOptions::default())
        .collect()?;

    for (field, digits) in fields.iter().zip(&precisions) {
        let mut rounded =
            grouped.column(field)?.f64()?.apply_values(|v| round_to(v, *digits)).into_series();
        rounded.rename(field.as_str().into());
        grouped.replace(field, rounded)?;
    }
    Ok(grouped)
}

/// One output file per parent, named `{code}_{infix}_{year}.csv`, with the
/// timestamp column first.
pub fn write_per_parent(
    df: &DataFrame,
    out_dir: &Path,
    infix: &str,
    year: i32,
    force: bool,
) -> Result<Vec<PathBuf>> {
    let value_cols: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .filter(|name| name != "parent_id" && name != "parent_code" && name != "Time_UTC")
        .collect();

    let mut parts: Vec<(String, DataFrame)> = Vec::new();
    for part in df.partition_by(["parent_code"], true)? {
        let code = part
            .column("parent_code")?
            .str()?
            .get(0)
            .context("parent partition has no code")?
            .to_string();
        parts.push((code, part));
    }
    parts.sort_by(|a, b| a.0.cmp(&b.0));

    let mut written = Vec::with_capacity(parts.len());
    for (code, part) in parts {
        let mut selection = vec!["Time_UTC".to_string()];
        selection.extend(value_cols.iter().cloned());
        let mut slim = part.select(selection)?;
        let path = out_dir.join(format!("{code}_{infix}_{year}.csv"));
        common::write_table_atomic(&mut slim, &path, force)?;
        written.push(path);
    }
    Ok(written)
}

/// Everything `rollup_directory` needs for one year.
#[derive(Debug, Clone)]
pub struct RollupParams {
    /// Directory of per-hour zone files, stamped `%Y_%m_%d_%H` at the front.
    pub zones_dir: PathBuf,
    /// Trailing part of the per-hour file names, before `.csv`.
    pub suffix: String,
    /// Zone id column in the per-hour files.
    pub data_zone_col: String,
    pub mapping_file: PathBuf,
    pub mapping_zone_col: String,
    pub mapping_parent_col: String,
    pub mapping_code_col: Option<String>,
    pub population_file: PathBuf,
    pub population_zone_col: String,
    pub year: i32,
    /// Wide-year projected layout instead of `pop_YYYY` historical columns.
    pub projected: bool,
    pub spec: FieldSpec,
    pub infix: String,
    pub out_dir: PathBuf,
    pub force: bool,
    pub verbose: u8,
}

/// Read a year's worth of per-hour zone files, roll them up, and write one
/// annual file per parent zone.
pub fn rollup_directory(params: &RollupParams) -> Result<Vec<PathBuf>> {
    validate_year(params.year)?;
    common::require_dir_exists(&params.zones_dir)?;
    common::ensure_dir_exists(&params.out_dir)?;

    let parents = ParentMap::from_csv(
        &params.mapping_file,
        &params.mapping_zone_col,
        &params.mapping_parent_col,
        params.mapping_code_col.as_deref(),
    )?;
    let population = if params.projected {
        PopulationTable::projected(&params.population_file, &params.population_zone_col, params.year)?
    } else {
        PopulationTable::historical(&params.population_file, &params.population_zone_col, params.year)?
    };
    let fractions = population_fractions(&parents, &population)?;

    let files = hour_files(&params.zones_dir, &params.suffix, params.year)?;
    ensure!(
        !files.is_empty(),
        "no files for {} matching '*{}.csv' in {}",
        params.year,
        params.suffix,
        params.zones_dir.display()
    );
    if params.verbose > 0 {
        eprintln!(
            "[rollup] {} hour files for {} across {} mapped zones",
            files.len(),
            params.year,
            fractions.height()
        );
    }

    let mut combined: Option<DataFrame> = None;
    for (stamp, path) in files {
        let mut df = common::read_csv_with_string_cols(&path, &[&params.data_zone_col])?;
        if params.data_zone_col != "zone_id" {
            df.rename(&params.data_zone_col, "zone_id".into())?;
        }
        let time = stamp.format("%Y-%m-%d %H:%M:%S").to_string();
        df.with_column(Column::new("Time_UTC".into(), vec![time; df.height()]))?;
        match combined.as_mut() {
            Some(all) => {
                all.vstack_mut(&df)?;
            }
            None => combined = Some(df),
        }
    }
    let Some(zones) = combined else {
        bail!("no readable hour files in {}", params.zones_dir.display());
    };

    let rolled = rollup(&zones, &fractions, &params.spec)?;
    let written = write_per_parent(&rolled, &params.out_dir, &params.infix, params.year, params.force)?;
    if params.verbose > 0 {
        eprintln!("[rollup] wrote {} parent files to {}", written.len(), params.out_dir.display());
    }
    Ok(written)
}

/// Per-hour files of one year, sorted by stamp.
fn hour_files(dir: &Path, suffix: &str, year: i32) -> Result<Vec<(NaiveDateTime, PathBuf)>> {
    let tail = format!("{suffix}.csv");
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(&tail) {
            continue;
        }
        if let Some(stamp) = parse_hour_stamp(&name) {
            if stamp.year() == year {
                files.push((stamp, entry.path()));
            }
        }
    }
    files.sort_by_key(|(stamp, _)| *stamp);
    Ok(files)
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .with_context(|| format!("input is missing field column '{name}'"))?
        .cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, body: &str) {
        fs::write(path, body).unwrap();
    }

    fn mapping(dir: &Path) -> ParentMap {
        let path = dir.join("mapping.csv");
        write(
            &path,
            "county_fips,ba_number,ba_abbreviation\n\
             01001,1,PJM\n01003,1,PJM\n01005,2,CISO\n",
        );
        ParentMap::from_csv(&path, "county_fips", "ba_number", Some("ba_abbreviation")).unwrap()
    }

    fn pop_of(table: &PopulationTable, zone: &str) -> f64 {
        table
            .rows()
            .iter()
            .find(|(id, _)| id.as_str() == zone)
            .map(|(_, v)| *v)
            .unwrap()
    }

    #[test]
    fn historical_population_clamps_to_the_file_span() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pop.csv");
        write(
            &path,
            "county_FIPS,pop_2000,pop_2019\n01001,100.4,150.6\n01003,200.0,300.0\n",
        );

        let early = PopulationTable::historical(&path, "county_FIPS", 1990).unwrap();
        assert_eq!(pop_of(&early, "01001"), 100.0);

        let late = PopulationTable::historical(&path, "county_FIPS", 2050).unwrap();
        assert_eq!(pop_of(&late, "01001"), 151.0);
        assert_eq!(pop_of(&late, "01003"), 300.0);
    }

    #[test]
    fn projected_population_interpolates_between_decades() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ssp.csv");
        write(&path, "FIPS,state_name,2020,2030\n01001,Alabama,100,200\n01003,Alabama,400,400\n");

        let mid = PopulationTable::projected(&path, "FIPS", 2025).unwrap();
        assert_eq!(pop_of(&mid, "01001"), 150.0);
        assert_eq!(pop_of(&mid, "01003"), 400.0);

        // outside the span clamps to the nearest known year
        let early = PopulationTable::projected(&path, "FIPS", 1999).unwrap();
        assert_eq!(pop_of(&early, "01001"), 100.0);
        let exact = PopulationTable::projected(&path, "FIPS", 2030).unwrap();
        assert_eq!(pop_of(&exact, "01001"), 200.0);
    }

    #[test]
    fn fractions_are_population_shares_of_the_parent() {
        let dir = tempfile::tempdir().unwrap();
        let parents = mapping(dir.path());
        let path = dir.path().join("pop.csv");
        // 01005 has no population row; 01007 has no parent mapping
        write(&path, "county_FIPS,pop_2019\n01001,100\n01003,300\n01007,50\n");
        let population = PopulationTable::historical(&path, "county_FIPS", 2019).unwrap();

        let df = population_fractions(&parents, &population).unwrap();
        assert_eq!(df.height(), 2);
        let fractions: Vec<f64> =
            df.column("fraction").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(fractions, vec![0.25, 0.75]);
        let codes: Vec<&str> =
            df.column("parent_code").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(codes, vec!["PJM", "PJM"]);
    }

    fn hour_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("zone_id".into(), vec!["01001", "01003", "01001", "01003"]),
            Column::new(
                "Time_UTC".into(),
                vec![
                    "2019-01-01 00:00:00",
                    "2019-01-01 00:00:00",
                    "2019-01-01 01:00:00",
                    "2019-01-01 01:00:00",
                ],
            ),
            Column::new("T2".into(), vec![280.0, 284.0, 281.0, 285.0]),
            Column::new("U10".into(), vec![3.0, 3.0, 0.0, 0.0]),
            Column::new("V10".into(), vec![4.0, 4.0, 2.0, 2.0]),
        ])
        .unwrap()
    }

    fn quarter_fractions() -> DataFrame {
        DataFrame::new(vec![
            Column::new("zone_id".into(), vec!["01001", "01003"]),
            Column::new("parent_id".into(), vec!["1", "1"]),
            Column::new("parent_code".into(), vec!["PJM", "PJM"]),
            Column::new("population".into(), vec![100.0, 300.0]),
            Column::new("fraction".into(), vec![0.25, 0.75]),
        ])
        .unwrap()
    }

    fn spec() -> FieldSpec {
        FieldSpec {
            fields: vec!["T2".into(), "U10".into(), "V10".into()],
            precisions: vec![2, 2, 2],
            derive: Some(DeriveMagnitude {
                x: "U10".into(),
                y: "V10".into(),
                name: "WSPD".into(),
            }),
        }
    }

    #[test]
    fn rollup_weights_by_population_and_derives_magnitude() {
        let out = rollup(&hour_frame(), &quarter_fractions(), &spec()).unwrap();
        assert_eq!(out.height(), 2);
        // wind components are gone, the magnitude is present
        assert!(out.column("U10").is_err());
        let t2: Vec<f64> = out.column("T2").unwrap().f64().unwrap().into_no_null_iter().collect();
        // 280*0.25 + 284*0.75 = 283, then the next hour one degree warmer
        assert_eq!(t2, vec![283.0, 284.0]);
        let wspd: Vec<f64> =
            out.column("WSPD").unwrap().f64().unwrap().into_no_null_iter().collect();
        // sqrt(3^2+4^2) = 5 everywhere in hour one, 2 in hour two
        assert_eq!(wspd, vec![5.0, 2.0]);
    }

    #[test]
    fn rollup_is_idempotent() {
        let a = rollup(&hour_frame(), &quarter_fractions(), &spec()).unwrap();
        let b = rollup(&hour_frame(), &quarter_fractions(), &spec()).unwrap();
        let t2a: Vec<f64> = a.column("T2").unwrap().f64().unwrap().into_no_null_iter().collect();
        let t2b: Vec<f64> = b.column("T2").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(t2a, t2b);
        assert_eq!(a.shape(), b.shape());
    }

    #[test]
    fn unmapped_zones_contribute_nothing() {
        let mut frame = hour_frame();
        let extra = DataFrame::new(vec![
            Column::new("zone_id".into(), vec!["99999"]),
            Column::new("Time_UTC".into(), vec!["2019-01-01 00:00:00"]),
            Column::new("T2".into(), vec![999.0]),
            Column::new("U10".into(), vec![0.0]),
            Column::new("V10".into(), vec![0.0]),
        ])
        .unwrap();
        frame.vstack_mut(&extra).unwrap();

        let out = rollup(&frame, &quarter_fractions(), &spec()).unwrap();
        let t2: Vec<f64> = out.column("T2").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(t2, vec![283.0, 284.0]);
    }

    #[test]
    fn per_parent_files_put_time_first() {
        let dir = tempfile::tempdir().unwrap();
        let out = rollup(&hour_frame(), &quarter_fractions(), &spec()).unwrap();
        let written =
            write_per_parent(&out, dir.path(), "WRF_Hourly_Mean_Meteorology", 2019, false)
                .unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("PJM_WRF_Hourly_Mean_Meteorology_2019.csv"));

        let body = fs::read_to_string(&written[0]).unwrap();
        let header = body.lines().next().unwrap();
        assert!(header.starts_with("Time_UTC,"));
        assert!(header.contains("WSPD"));
        assert!(!header.contains("parent_id"));
    }
}

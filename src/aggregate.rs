//! Zone-level reductions of per-cell fields, plus the global mass balance.

use anyhow::{bail, ensure, Context, Result};
use polars::prelude::{ChunkApply, Column, DataFrame, DataType, IntoSeries};
use serde::Serialize;

use crate::grid::Grid;
use crate::weights::WeightTable;
use crate::zone::ZoneSet;

/// Tolerances for deciding whether an aggregate total matches the input
/// total or needs correction. Relative plus absolute, so tiny and huge
/// fields are both judged sensibly.
const BALANCE_ATOL: f64 = 1e-8;
const BALANCE_RTOL: f64 = 1e-5;

/// Named per-cell fields, where row `i` holds the value of cell index `i`.
/// Rows must line up with the enumeration the weight table was built from.
#[derive(Debug, Clone)]
pub struct FieldSet {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl FieldSet {
    /// One field straight from a grid, in enumeration order. NaN rows are
    /// kept so row position keeps matching cell index.
    pub fn from_grid(name: &str, grid: &Grid) -> Self {
        let values = grid.cells(false).map(|cell| cell.value).collect();
        Self { names: vec![name.to_string()], columns: vec![values] }
    }

    /// Selected numeric columns of a frame. Nulls become NaN.
    pub fn from_frame(df: &DataFrame, fields: &[&str]) -> Result<Self> {
        ensure!(!fields.is_empty(), "no fields selected");
        let mut names = Vec::with_capacity(fields.len());
        let mut columns = Vec::with_capacity(fields.len());
        for &field in fields {
            let column = df
                .column(field)
                .with_context(|| format!("input is missing field column '{field}'"))?
                .cast(&DataType::Float64)?;
            columns.push(column.f64()?.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect());
            names.push(field.to_string());
        }
        Ok(Self { names, columns })
    }

    #[inline] pub fn names(&self) -> &[String] { &self.names }

    #[inline] pub fn len(&self) -> usize { self.columns.first().map_or(0, Vec::len) }

    #[inline]
    fn value(&self, field: usize, cell: u32) -> f64 {
        self.columns[field].get(cell as usize).copied().unwrap_or(f64::NAN)
    }

    /// Sum over non-NaN rows: the mass aggregation is expected to conserve.
    pub fn considered_total(&self, field: usize) -> f64 {
        self.columns[field].iter().filter(|v| !v.is_nan()).sum()
    }
}

/// What `balance` did to one unit's aggregate, for the batch summary.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceReport {
    pub unit: String,
    pub corrections: Vec<FieldCorrection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldCorrection {
    pub field: String,
    pub expected: f64,
    pub observed: f64,
    /// Per-zone adjustment that was added to every row.
    pub spread: f64,
}

impl BalanceReport {
    #[inline]
    pub fn corrected(&self) -> bool {
        !self.corrections.is_empty()
    }
}

/// Conservative redistribution: value times weight, summed per zone. Every
/// zone of the set gets a row (zero when nothing lands in it); rows come out
/// sorted by zone id.
pub fn sum_by_zone(weights: &WeightTable, fields: &FieldSet, zones: &ZoneSet) -> Result<DataFrame> {
    let mut acc = vec![vec![0.0f64; fields.names().len()]; zones.len()];
    for record in weights.records() {
        let Some(pos) = zones.position(&record.zone) else {
            bail!("weight table references zone '{}' absent from the zone layer", record.zone);
        };
        for field in 0..fields.names().len() {
            let value = fields.value(field, record.cell_index);
            if value.is_nan() {
                continue;
            }
            acc[pos as usize][field] += value * record.weight;
        }
    }
    zone_frame(zones, fields.names(), |zone, field| acc[zone][field])
}

/// Weighted mean per zone. Expects the `zone_share` variant of the weight
/// table, whose weights sum to 1 within each zone. Cells with NaN values are
/// excluded and the remaining shares renormalized; a zone with nothing left
/// comes out NaN. `precisions` rounds named fields to fixed decimals.
pub fn mean_by_zone(
    weights: &WeightTable,
    fields: &FieldSet,
    zones: &ZoneSet,
    precisions: &[(&str, u32)],
) -> Result<DataFrame> {
    let n_fields = fields.names().len();
    let mut acc = vec![vec![0.0f64; n_fields]; zones.len()];
    let mut share = vec![vec![0.0f64; n_fields]; zones.len()];
    for record in weights.records() {
        let Some(pos) = zones.position(&record.zone) else {
            bail!("weight table references zone '{}' absent from the zone layer", record.zone);
        };
        for field in 0..n_fields {
            let value = fields.value(field, record.cell_index);
            if value.is_nan() {
                continue;
            }
            acc[pos as usize][field] += value * record.weight;
            share[pos as usize][field] += record.weight;
        }
    }
    zone_frame(zones, fields.names(), |zone, field| {
        let mean = acc[zone][field] / share[zone][field];
        match precisions.iter().find(|(name, _)| *name == fields.names()[field]) {
            Some(&(_, digits)) => round_to(mean, digits),
            None => mean,
        }
    })
}

/// Force the aggregate's column totals back onto the expected input totals.
///
/// Any residual beyond tolerance is spread evenly across all zone rows so
/// the column total lands exactly on the input total. Always logs when it
/// corrects.
pub fn balance(
    df: &mut DataFrame,
    expected: &[(&str, f64)],
    unit: &str,
) -> Result<BalanceReport> {
    let n_zones = df.height();
    ensure!(n_zones > 0, "cannot balance an empty aggregate");

    let mut corrections = Vec::new();
    for &(field, want) in expected {
        let column = df
            .column(field)
            .with_context(|| format!("aggregate is missing field column '{field}'"))?
            .f64()?;
        let got: f64 = column.into_no_null_iter().sum();
        if (want - got).abs() <= BALANCE_ATOL + BALANCE_RTOL * want.abs() {
            continue;
        }
        let spread = (want - got) / n_zones as f64;
        let mut adjusted = column.apply_values(|v| v + spread).into_series();
        adjusted.rename(field.into());
        df.replace(field, adjusted)?;
        eprintln!(
            "[aggregate] {unit}: '{field}' off by {:+.6e}; spread {spread:+.6e} over {n_zones} zones",
            want - got
        );
        corrections.push(FieldCorrection {
            field: field.to_string(),
            expected: want,
            observed: got,
            spread,
        });
    }
    Ok(BalanceReport { unit: unit.to_string(), corrections })
}

/// Round to a fixed number of decimal digits. NaN passes through.
pub(crate) fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// One row per zone sorted by id, one column per field.
fn zone_frame(
    zones: &ZoneSet,
    fields: &[String],
    value: impl Fn(usize, usize) -> f64,
) -> Result<DataFrame> {
    let mut order: Vec<usize> = (0..zones.len()).collect();
    order.sort_by(|&a, &b| zones.id_at(a).cmp(zones.id_at(b)));

    let ids: Vec<&str> = order.iter().map(|&i| zones.id_at(i).as_str()).collect();
    let mut columns = vec![Column::new("zone_id".into(), ids)];
    for (field, name) in fields.iter().enumerate() {
        let values: Vec<f64> = order.iter().map(|&zone| value(zone, field)).collect();
        columns.push(Column::new(name.as_str().into(), values));
    }
    Ok(DataFrame::new(columns)?)
}

//! Cell-to-zone weight tables: the persisted product of the overlay.

mod build;
pub mod cache;
mod correct;

pub use build::build;

use ahash::AHashMap;
use anyhow::{anyhow, bail, ensure, Result};
use polars::prelude::{Column, DataFrame, DataType};
use smallvec::SmallVec;

use crate::zone::ZoneId;

/// Per-cell overlay fragments as (zone position, fragment area). Cells rarely
/// straddle more than a handful of zones.
pub(crate) type CellFragments = SmallVec<[(usize, f64); 4]>;

/// One cell's share of one zone. Weights are fractions of the cell's nominal
/// area, so a cell's records sum to 1.0 after correction.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightRecord {
    pub cell_index: u32,
    pub zone: ZoneId,
    pub weight: f64,
}

/// The full weight table for one (grid geometry, zone layer) pair. Built once
/// per pair, persisted, and shared read-only across batch units.
#[derive(Debug, Clone)]
pub struct WeightTable {
    records: Vec<WeightRecord>,
    by_cell: AHashMap<u32, SmallVec<[u32; 4]>>,
}

impl WeightTable {
    /// Index a record list. Records are kept sorted by (cell, zone) so that
    /// derived tables and saved caches come out deterministic.
    pub fn new(mut records: Vec<WeightRecord>) -> Self {
        records.sort_by(|a, b| (a.cell_index, &a.zone).cmp(&(b.cell_index, &b.zone)));
        let mut by_cell: AHashMap<u32, SmallVec<[u32; 4]>> = AHashMap::new();
        for (pos, record) in records.iter().enumerate() {
            by_cell.entry(record.cell_index).or_default().push(pos as u32);
        }
        Self { records, by_cell }
    }

    #[inline] pub fn len(&self) -> usize { self.records.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.records.is_empty() }

    #[inline] pub fn records(&self) -> &[WeightRecord] { &self.records }

    /// Number of distinct cells the table covers.
    #[inline] pub fn cell_count(&self) -> usize { self.by_cell.len() }

    /// Highest cell index any record references. Records are kept sorted by
    /// cell, so this is the last one.
    pub fn max_cell_index(&self) -> Option<u32> {
        self.records.last().map(|r| r.cell_index)
    }

    /// All records of one cell, in zone order.
    pub fn weights_for_cell(&self, cell: u32) -> impl Iterator<Item = &WeightRecord> + '_ {
        self.by_cell
            .get(&cell)
            .into_iter()
            .flat_map(move |positions| positions.iter().map(|&pos| &self.records[pos as usize]))
    }

    /// Derive the per-zone-normalized variant: each zone's weights sum to 1,
    /// which is the table a weighted mean wants.
    pub fn zone_share(&self) -> WeightTable {
        let mut totals: AHashMap<&ZoneId, f64> = AHashMap::new();
        for record in &self.records {
            *totals.entry(&record.zone).or_insert(0.0) += record.weight;
        }
        let records = self
            .records
            .iter()
            .map(|record| WeightRecord {
                cell_index: record.cell_index,
                zone: record.zone.clone(),
                weight: record.weight / totals.get(&record.zone).copied().unwrap_or(1.0),
            })
            .collect();
        WeightTable::new(records)
    }

    /// Lay the table out as a three-column frame for persistence.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let cells: Vec<u32> = self.records.iter().map(|r| r.cell_index).collect();
        let zones: Vec<&str> = self.records.iter().map(|r| r.zone.as_str()).collect();
        let weights: Vec<f64> = self.records.iter().map(|r| r.weight).collect();
        Ok(DataFrame::new(vec![
            Column::new("cell_index".into(), cells),
            Column::new("zone_id".into(), zones),
            Column::new("weight".into(), weights),
        ])?)
    }

    /// Rebuild a table from a persisted frame, validating shape as we go.
    /// Anything structurally off is fatal; a stale-but-wellformed cache is
    /// the caller's problem.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        fn required<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
            df.column(name)
                .map_err(|_| anyhow!("weight table is missing required column '{name}'"))
        }

        let cells = required(df, "cell_index")?.cast(&DataType::Int64)?;
        let zones = required(df, "zone_id")?.cast(&DataType::String)?;
        let weights = required(df, "weight")?.cast(&DataType::Float64)?;
        ensure!(df.height() > 0, "weight table contains no rows");

        let (cells, zones, weights) = (cells.i64()?, zones.str()?, weights.f64()?);
        let mut records = Vec::with_capacity(df.height());
        for row in 0..df.height() {
            let (Some(cell), Some(zone), Some(weight)) =
                (cells.get(row), zones.get(row), weights.get(row))
            else {
                bail!("weight table has a null entry at row {row}");
            };
            let cell_index = u32::try_from(cell)
                .map_err(|_| anyhow!("invalid cell index {cell} at row {row}"))?;
            records.push(WeightRecord { cell_index, zone: ZoneId::new(zone), weight });
        }
        Ok(Self::new(records))
    }
}

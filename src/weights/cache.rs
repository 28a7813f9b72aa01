use std::path::Path;

use anyhow::{Context, Result};

use crate::common;
use crate::weights::WeightTable;

/// Load a previously persisted weight table, skipping overlay and correction
/// entirely. CSV or Parquet is chosen by extension; zone ids are read as text
/// so "01" never collapses to 1.
pub fn load(path: &Path) -> Result<WeightTable> {
    common::require_file_exists(path)?;
    let df = common::read_table(path, &["zone_id"])?;
    WeightTable::from_frame(&df)
        .with_context(|| format!("Invalid weights cache: {}", path.display()))
}

/// Persist a weight table. Single writer, atomic rename, overwrite gated
/// behind `force`.
pub fn save(table: &WeightTable, path: &Path, force: bool) -> Result<()> {
    let mut df = table.to_frame()?;
    common::write_table_atomic(&mut df, path, force)
        .with_context(|| format!("Failed to write weights cache: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::WeightRecord;
    use crate::zone::ZoneId;
    use std::fs;

    #[test]
    fn single_row_cache_loads_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.csv");
        fs::write(&path, "cell_index,zone_id,weight\n1,01,0.01\n").unwrap();

        let table = load(&path).unwrap();
        assert_eq!(table.len(), 1);
        let record = &table.records()[0];
        assert_eq!(record.cell_index, 1);
        assert_eq!(record.zone.as_str(), "01");
        assert!((record.weight - 0.01).abs() < 1e-12);
    }

    #[test]
    fn cache_missing_weight_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.csv");
        fs::write(&path, "cell_index,zone_id\n1,01\n").unwrap();

        let err = load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("'weight'"));
    }

    #[test]
    fn header_only_cache_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.csv");
        fs::write(&path, "cell_index,zone_id,weight\n").unwrap();

        let err = load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("no rows"));
    }

    #[test]
    fn missing_cache_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("absent.csv")).is_err());
    }

    #[test]
    fn save_then_load_round_trips_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.parquet");
        let table = WeightTable::new(vec![
            WeightRecord { cell_index: 0, zone: ZoneId::new("01001"), weight: 0.4 },
            WeightRecord { cell_index: 0, zone: ZoneId::new("01003"), weight: 0.6 },
        ]);

        save(&table, &path, false).unwrap();
        let back = load(&path).unwrap();
        assert_eq!(back.records(), table.records());

        // a second save without --force refuses to clobber
        assert!(save(&table, &path, false).is_err());
        save(&table, &path, true).unwrap();
    }
}

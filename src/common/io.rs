use std::fs::{self, File};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use polars::frame::DataFrame;
use polars::io::{SerReader, SerWriter};
use polars::prelude::{
    CsvReadOptions, CsvReader, CsvWriter, DataType, Field, ParquetReader, ParquetWriter, Schema,
};
use tempfile::NamedTempFile;

/// Reads a CSV file from `path` into a Polars DataFrame.
pub(crate) fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    CsvReader::new(file)
        .finish()
        .with_context(|| format!("Failed to read CSV from {}", path.display()))
}

/// Reads a CSV file, forcing the named columns to be parsed as strings.
/// Zone ids carry leading zeros that numeric inference would destroy.
pub(crate) fn read_csv_with_string_cols(path: &Path, string_cols: &[&str]) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    let schema = Arc::new(Schema::from_iter(
        string_cols.iter().map(|name| Field::new((*name).into(), DataType::String)),
    ));
    CsvReadOptions::default()
        .with_schema_overwrite(Some(schema))
        .into_reader_with_file_handle(file)
        .finish()
        .with_context(|| format!("Failed to read CSV from {}", path.display()))
}

/// Write a DataFrame to a CSV file.
pub(crate) fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    CsvWriter::new(file)
        .finish(df)
        .with_context(|| format!("Failed to write CSV to {}", path.display()))
}

/// Reads a Parquet file from `path` into a Polars DataFrame.
pub(crate) fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open Parquet file: {}", path.display()))?;
    ParquetReader::new(file)
        .finish()
        .with_context(|| format!("Failed to read Parquet from {}", path.display()))
}

/// True if the path's extension selects the Parquet format; CSV otherwise.
pub(crate) fn is_parquet_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"))
}

/// Read a table by file extension, forcing `string_cols` to strings for CSV.
/// Parquet carries its own schema, so the overwrite only applies to CSV.
pub(crate) fn read_table(path: &Path, string_cols: &[&str]) -> Result<DataFrame> {
    if is_parquet_path(path) {
        read_parquet(path)
    } else {
        read_csv_with_string_cols(path, string_cols)
    }
}

/// Write a table by file extension, atomically (write-then-rename).
pub(crate) fn write_table_atomic(df: &mut DataFrame, path: &Path, force: bool) -> Result<()> {
    let mut pending = begin_write(path, force)?;
    if is_parquet_path(path) {
        ParquetWriter::new(&mut pending)
            .finish(df)
            .with_context(|| format!("Failed to write Parquet to {}", path.display()))?;
    } else {
        CsvWriter::new(&mut pending)
            .finish(df)
            .with_context(|| format!("Failed to write CSV to {}", path.display()))?;
    }
    commit_write(pending)
}

/// Write-then-rename wrapper for atomic file outputs
#[derive(Debug)]
pub(crate) struct PendingWrite {
    target: PathBuf,
    tmp: Option<(NamedTempFile, bool)>, // (file, need_fsync_dir)
}

pub(crate) fn begin_write(target: &Path, force: bool) -> Result<PendingWrite> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create dir {}", parent.display()))?;
    }
    if !force && target.exists() {
        bail!("Refusing to overwrite existing file: {} (use --force)", target.display());
    }
    let need_fsync_dir = target.parent().is_some();
    let tmp = NamedTempFile::new_in(target.parent().unwrap_or(Path::new(".")))
        .context("create temp file")?;

    Ok(PendingWrite { target: target.to_path_buf(), tmp: Some((tmp, need_fsync_dir)) })
}

impl Write for PendingWrite {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.tmp.as_mut().unwrap().0.write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.tmp.as_mut().unwrap().0.flush()
    }
}
impl Seek for PendingWrite {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        self.tmp.as_mut().unwrap().0.as_file_mut().seek(pos)
    }
}

pub(crate) fn commit_write(mut pending: PendingWrite) -> Result<()> {
    let (tmp, need_fsync_dir) = pending.tmp.take().expect("not finalized");
    tmp.as_file().sync_all().ok(); // best-effort fsync file
    tmp.persist(&pending.target)
        .with_context(|| format!("rename to {}", pending.target.display()))?;
    if need_fsync_dir {
        if let Some(dir) = pending.target.parent() {
            let _ = File::open(dir).and_then(|f| f.sync_all());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::Column;

    #[test]
    fn parquet_extension_detection() {
        assert!(is_parquet_path(Path::new("weights.parquet")));
        assert!(is_parquet_path(Path::new("weights.PARQUET")));
        assert!(!is_parquet_path(Path::new("weights.csv")));
        assert!(!is_parquet_path(Path::new("weights")));
    }

    #[test]
    fn refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.csv");
        fs::write(&target, "existing").unwrap();

        let err = begin_write(&target, false).unwrap_err();
        assert!(err.to_string().contains("--force"), "unexpected error: {err}");
        assert!(begin_write(&target, true).is_ok());
    }

    #[test]
    fn atomic_write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("table.csv");

        let mut df = DataFrame::new(vec![
            Column::new("zone_id".into(), ["01", "02"].as_ref()),
            Column::new("value".into(), [1.5f64, 2.5].as_ref()),
        ])
        .unwrap();

        write_table_atomic(&mut df, &target, false).unwrap();
        let back = read_table(&target, &["zone_id"]).unwrap();
        assert_eq!(back.height(), 2);
        let ids: Vec<_> =
            back.column("zone_id").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(ids, vec!["01", "02"]);
    }

    #[test]
    fn string_override_preserves_leading_zeros() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ids.csv");
        fs::write(&target, "zone_id,value\n01001,3.0\n").unwrap();

        let df = read_csv_with_string_cols(&target, &["zone_id"]).unwrap();
        let ids: Vec<_> =
            df.column("zone_id").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(ids, vec!["01001"]);
    }
}

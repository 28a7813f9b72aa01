use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Create the directory (and parents) when absent. A non-directory already
/// occupying the path is fatal.
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        bail!("Path exists but is not a directory: {}", path.display());
    }
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {}", path.display()))
}

/// Error unless the directory already exists.
pub(crate) fn require_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("Directory does not exist: {}", path.display());
    }
    if !path.is_dir() {
        bail!("Path exists but is not a directory: {}", path.display());
    }
    Ok(())
}

/// Error unless the file already exists.
pub(crate) fn require_file_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("File does not exist: {}", path.display());
    }
    Ok(())
}

//! Locating and loading ledger files

use std::path::{Path, PathBuf};

use super::LedgerDocument;
use crate::config::BenchmarkOptions;
use crate::{Error, Result};

/// Find a ledger file: `filename` as given, then under `results_dir`.
///
/// # Errors
///
/// Returns `Error::LedgerNotFound` if neither exists
pub fn locate(filename: &str, results_dir: &Path) -> Result<PathBuf> {
    let direct = PathBuf::from(filename);
    if direct.is_file() {
        return Ok(direct);
    }
    let nested = results_dir.join(filename);
    if nested.is_file() {
        return Ok(nested);
    }
    Err(Error::LedgerNotFound {
        filename: filename.to_string(),
        results_dir: results_dir.display().to_string(),
    })
}

/// Load the ledger named by `options`.
///
/// # Errors
///
/// Returns `Error::LedgerNotFound`, or I/O and parse errors
pub fn load(options: &BenchmarkOptions) -> Result<LedgerDocument> {
    let path = locate(&options.checkpoint_filename, &options.results_dir)?;
    tracing::info!(path = %path.display(), "loading ledger");
    LedgerDocument::from_path(path)
}

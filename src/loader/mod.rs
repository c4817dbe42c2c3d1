//! Imports scrape artifacts into the catalog store.

use crate::models::{OutputRow, CSV_HEADERS};
use crate::storage::Repository;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub rows: usize,
    pub imported: usize,
    pub failed: usize,
}

/// Supplier id from an artifact filename.
/// "2021-05-17--08-59-52--vapeclub.csv" → "vapeclub"
pub fn supplier_from_filename(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let supplier = stem.rsplit("--").next()?.trim();
    if supplier.is_empty() { None } else { Some(supplier.to_string()) }
}

pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == "csv").unwrap_or(false) {
            files.push(path);
        }
    }
    // Timestamped names sort oldest first, so newer prices win.
    files.sort();
    Ok(files)
}

/// Read an artifact and import every row. Bad rows are logged with their
/// line number (header is line 1) and skipped.
pub fn import_artifact(
    repo: &Repository,
    path: &Path,
    supplier_name: &str,
    sep: &str,
) -> Result<ImportStats> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Cannot open {:?}", path))?;

    let headers = reader.headers()?.clone();
    if !headers.iter().eq(CSV_HEADERS) {
        anyhow::bail!("{:?} does not have the expected header {:?}", path, CSV_HEADERS);
    }

    let supplier_id = repo.get_or_create_supplier(supplier_name)?;
    debug!("Importing {:?} as supplier '{}'", path, supplier_name);

    let mut stats = ImportStats::default();
    for (i, result) in reader.deserialize::<OutputRow>().enumerate() {
        let line = i + 2;
        stats.rows += 1;

        let outcome = result
            .map_err(anyhow::Error::from)
            .and_then(|row| repo.import_row(supplier_id, &row, sep));
        match outcome {
            Ok(()) => stats.imported += 1,
            Err(e) => {
                warn!("Row {} in {:?}: {:#}", line, path, e);
                stats.failed += 1;
            }
        }
    }

    info!(
        "{:?}: {} rows, {} imported, {} failed",
        path, stats.rows, stats.imported, stats.failed
    );
    Ok(stats)
}

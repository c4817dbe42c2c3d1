//! CSV sink for scraped rows.
//!
//! The header is written when the sink is opened and every row is flushed as
//! soon as it is appended, so an interrupted crawl keeps everything written
//! before the interruption.

use crate::models::{OutputRow, CSV_HEADERS};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

/// `<dir>/2021-05-17--08-59-52--vapeclub.csv`
pub fn artifact_path(dir: &Path, supplier: &str, now: NaiveDateTime) -> PathBuf {
    dir.join(format!("{}--{}.csv", now.format("%Y-%m-%d--%H-%M-%S"), supplier))
}

impl CsvSink<File> {
    /// Create (or truncate) the artifact and write the header.
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::create(path).with_context(|| format!("Cannot create CSV at {:?}", path))?;
        Self::from_writer(file).with_context(|| format!("Cannot write CSV header to {:?}", path))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(inner: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer.write_record(CSV_HEADERS)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    pub fn append(&mut self, row: &OutputRow) -> Result<()> {
        self.writer
            .serialize(row)
            .with_context(|| format!("write row for {}", row.purchase_url))?;
        self.writer.flush().context("flush CSV")?;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("flush CSV: {}", e.error()))
    }
}

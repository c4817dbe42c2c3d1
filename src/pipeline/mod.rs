//! Pipeline orchestrator: supplier ids → crawl → CSV artifacts.
//!
//! Suppliers run one after another, each with its own rules, HTTP client and
//! artifact. An unknown id or a supplier whose crawl aborts is reported and
//! the remaining suppliers still run.

pub mod crawl;

use crate::config::{AppConfig, ScraperConfig};
use crate::scraper::http_client::HttpClient;
use crate::scraper::rules::CrawlRules;
use crate::scraper::{PageSource, SupplierScraper};
use crate::sink::{artifact_path, CsvSink};
use crate::utils::Timer;
use anyhow::{Context, Result};
use chrono::Local;
use std::path::PathBuf;
use tracing::{error, info};

use self::crawl::{CrawlController, CrawlStats};

pub struct Pipeline {
    config: AppConfig,
}

#[derive(Debug, Default)]
pub struct PipelineStats {
    pub suppliers_requested: usize,
    pub suppliers_unknown: usize,
    /// Known suppliers that could not be set up or whose crawl aborted.
    pub suppliers_failed: usize,
    pub rows_written: usize,
    pub artifacts: Vec<PathBuf>,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self, suppliers: &[String]) -> Result<PipelineStats> {
        self.run_with(suppliers, HttpClient::new).await
    }

    /// Same as [`Pipeline::run`] with a caller-supplied page source factory.
    pub async fn run_with<S, F>(&self, suppliers: &[String], make_source: F) -> Result<PipelineStats>
    where
        S: PageSource,
        F: Fn(&ScraperConfig) -> Result<S>,
    {
        let dir = &self.config.output.dir;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Error when creating CSV directory {:?}", dir))?;

        let mut stats = PipelineStats {
            suppliers_requested: suppliers.len(),
            ..Default::default()
        };

        for id in suppliers {
            if self.config.supplier(id).is_none() {
                error!(
                    "Error: no support for supplier '{}'. Supported suppliers: {:?}",
                    id,
                    self.config.supplier_ids()
                );
                stats.suppliers_unknown += 1;
                continue;
            }

            match self.run_supplier(id, &make_source).await {
                Ok((path, crawl)) => {
                    stats.rows_written += crawl.rows_written;
                    stats.artifacts.push(path);
                    if crawl.aborted {
                        stats.suppliers_failed += 1;
                    }
                }
                Err(e) => {
                    error!("[{}] {:#}", id, e);
                    stats.suppliers_failed += 1;
                }
            }
        }

        Ok(stats)
    }

    async fn run_supplier<S, F>(&self, id: &str, make_source: &F) -> Result<(PathBuf, CrawlStats)>
    where
        S: PageSource,
        F: Fn(&ScraperConfig) -> Result<S>,
    {
        let supplier = self
            .config
            .supplier(id)
            .with_context(|| format!("no support for supplier '{}'", id))?;
        let _t = Timer::start(format!("Scraping '{}'", id));

        let rules = CrawlRules::compile(supplier, &self.config.criteria, &self.config.output.separator)
            .context("Invalid scrape rules")?;
        let source = make_source(&self.config.scraper)?;

        let path = artifact_path(&self.config.output.dir, id, Local::now().naive_local());
        let controller = CrawlController::new(id, SupplierScraper::new(source, rules));
        let (crawl, _sink) = controller
            .run(&supplier.start_url, || {
                CsvSink::open(&path)
                    .with_context(|| format!("Error: cannot write to CSV for supplier '{}'", id))
            })
            .await?;

        info!(
            "[{}] {}: {} pages ({} transitions), {}/{} entries visited, {} rows written, {} skipped, {} failed, {} write errors → {:?}",
            id,
            if crawl.aborted { "Aborted" } else { "Done" },
            crawl.listing_pages,
            crawl.page_transitions,
            crawl.products_visited,
            crawl.entries_seen,
            crawl.rows_written,
            crawl.entries_skipped,
            crawl.products_failed,
            crawl.write_errors,
            path,
        );

        Ok((path, crawl))
    }
}

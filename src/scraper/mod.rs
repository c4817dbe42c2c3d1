pub mod cleaner;
pub mod extractor;
pub mod filter;
pub mod http_client;
pub mod parsers;
pub mod rules;
pub mod selectors;

use crate::models::{CatalogPage, ExtractionFailure, OutputRow};
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use self::extractor::extract;
use self::parsers::{parse_catalog_page, ProductDocument};
use self::rules::CrawlRules;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("bad status {status} from {url}")]
    Status { url: String, status: u16 },
}

/// Why a single product produced no row. Never fatal to the crawl.
#[derive(Debug, Error)]
pub enum ProductError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extract(#[from] ExtractionFailure),
}

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable page fetcher: the live HTTP client, or canned pages in tests.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;
}

// ── Supplier scraper ──────────────────────────────────────────────────────────

/// Fetches and parses pages of one supplier site.
pub struct SupplierScraper<S> {
    source: S,
    rules: CrawlRules,
}

impl<S: PageSource> SupplierScraper<S> {
    pub fn new(source: S, rules: CrawlRules) -> Self {
        Self { source, rules }
    }

    pub fn rules(&self) -> &CrawlRules {
        &self.rules
    }

    pub async fn fetch_listing(&self, url: &str) -> Result<CatalogPage, FetchError> {
        let html = self.source.get_text(url).await?;
        let page = parse_catalog_page(&html, &self.rules.selectors);
        debug!(
            "{}: {} entries, next={:?}",
            url,
            page.entries.len(),
            page.next_link
        );
        Ok(page)
    }

    pub async fn scrape_product(&self, url: &str) -> Result<OutputRow, ProductError> {
        let html = self.source.get_text(url).await?;
        let doc = ProductDocument::parse(&html, &self.rules.selectors);
        Ok(extract(&doc, url, &self.rules)?)
    }
}

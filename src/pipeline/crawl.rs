//! Crawl controller for one supplier.
//!
//! Walks the catalog page by page as an explicit state machine:
//!
//! ```text
//! FetchingListing(url) ──ok──▶ ProcessingEntries(page) ──next link──▶ FetchingListing(next)
//!        │ fetch error                 │ empty page / no next link / page already seen
//!        ▼                             ▼
//!       Done ◀─────────────────────── Done
//! ```
//!
//! The start page is fetched before the sink is opened, so an unreachable
//! supplier gets no artifact. After that only a failed listing fetch ends the
//! crawl early. Product failures are logged and skipped; rows go to the sink
//! as soon as they are extracted.

use crate::models::{CatalogPage, ListingEntry};
use crate::scraper::{PageSource, ProductError, SupplierScraper};
use crate::sink::CsvSink;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::io::Write;
use tracing::{debug, error, info, warn};
use url::Url;

#[derive(Debug)]
pub enum CrawlState {
    FetchingListing(String),
    /// A fetched listing page and the URL it came from.
    ProcessingEntries { url: String, page: CatalogPage },
    Done,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub listing_pages: usize,
    /// ProcessingEntries → FetchingListing transitions.
    pub page_transitions: usize,
    pub entries_seen: usize,
    pub entries_skipped: usize,
    pub products_visited: usize,
    pub rows_written: usize,
    pub products_failed: usize,
    pub write_errors: usize,
    /// A listing page after the first could not be fetched.
    pub aborted: bool,
}

pub struct CrawlController<S> {
    supplier: String,
    scraper: SupplierScraper<S>,
}

impl<S: PageSource> CrawlController<S> {
    pub fn new(supplier: impl Into<String>, scraper: SupplierScraper<S>) -> Self {
        Self {
            supplier: supplier.into(),
            scraper,
        }
    }

    /// Crawl from `start_url`. The sink is only opened once the start page
    /// has been fetched; failing either is an error for the whole supplier.
    pub async fn run<W, F>(&self, start_url: &str, open_sink: F) -> Result<(CrawlStats, CsvSink<W>)>
    where
        W: Write,
        F: FnOnce() -> Result<CsvSink<W>>,
    {
        let mut stats = CrawlStats {
            listing_pages: 1,
            ..Default::default()
        };
        // Same normalisation as resolved next links, so a link back to the start matches.
        let start_key = Url::parse(start_url).map_or_else(|_| start_url.to_string(), String::from);
        let mut seen = HashSet::from([start_key]);

        info!("[{}] listing page 1: {}", self.supplier, start_url);
        let page = self
            .scraper
            .fetch_listing(start_url)
            .await
            .with_context(|| format!("Error: cannot reach start page {}", start_url))?;
        let mut sink = open_sink()?;

        let mut state = CrawlState::ProcessingEntries {
            url: start_url.to_string(),
            page,
        };
        loop {
            state = match state {
                CrawlState::FetchingListing(url) => self.fetch_listing(url, &mut stats).await,
                CrawlState::ProcessingEntries { url, page } => {
                    self.process_entries(&url, page, &mut seen, &mut sink, &mut stats)
                        .await
                }
                CrawlState::Done => break,
            };
        }

        Ok((stats, sink))
    }

    async fn fetch_listing(&self, url: String, stats: &mut CrawlStats) -> CrawlState {
        stats.listing_pages += 1;
        info!("[{}] listing page {}: {}", self.supplier, stats.listing_pages, url);

        match self.scraper.fetch_listing(&url).await {
            Ok(page) => CrawlState::ProcessingEntries { url, page },
            Err(e) => {
                error!("[{}] aborting crawl: {}", self.supplier, e);
                stats.aborted = true;
                CrawlState::Done
            }
        }
    }

    async fn process_entries<W: Write>(
        &self,
        url: &str,
        page: CatalogPage,
        seen: &mut HashSet<String>,
        sink: &mut CsvSink<W>,
        stats: &mut CrawlStats,
    ) -> CrawlState {
        if page.entries.is_empty() {
            // The previous page was the last one.
            debug!("[{}] empty listing page, stopping", self.supplier);
            return CrawlState::Done;
        }

        for entry in &page.entries {
            self.process_entry(url, entry, sink, stats).await;
        }

        let Some(next) = page.next_link else {
            return CrawlState::Done;
        };
        let Some(next_url) = self.scraper.rules().resolve(url, &next) else {
            warn!("[{}] unusable next-page link {:?}, stopping", self.supplier, next);
            return CrawlState::Done;
        };
        if !seen.insert(next_url.clone()) {
            warn!("[{}] next page {} was already crawled, stopping", self.supplier, next_url);
            return CrawlState::Done;
        }

        stats.page_transitions += 1;
        CrawlState::FetchingListing(next_url)
    }

    async fn process_entry<W: Write>(
        &self,
        page_url: &str,
        entry: &ListingEntry,
        sink: &mut CsvSink<W>,
        stats: &mut CrawlStats,
    ) {
        stats.entries_seen += 1;

        if !self.scraper.rules().filter.should_visit(entry) {
            debug!("skip {:?} ({})", entry.title, entry.link);
            stats.entries_skipped += 1;
            return;
        }

        let Some(url) = self.scraper.rules().resolve(page_url, &entry.link) else {
            warn!("unusable product link {:?}", entry.link);
            stats.products_failed += 1;
            return;
        };

        stats.products_visited += 1;
        match self.scraper.scrape_product(&url).await {
            Ok(row) => match sink.append(&row) {
                Ok(()) => {
                    debug!("  - {}", url);
                    stats.rows_written += 1;
                }
                Err(e) => {
                    warn!("Error when appending to CSV: {:#}", e);
                    stats.write_errors += 1;
                }
            },
            Err(ProductError::Extract(f)) => {
                info!(
                    field = %f.field(),
                    stage = %f.stage(),
                    "Scrape cancelled for product: {} at {}",
                    f,
                    url
                );
                stats.products_failed += 1;
            }
            Err(ProductError::Fetch(e)) => {
                warn!("Scrape cancelled for product: {}", e);
                stats.products_failed += 1;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::scraper::rules::CrawlRules;
    use crate::scraper::FetchError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    pub(crate) const BASE: &str = "https://www.vapeclub.co.uk";

    /// Canned site: URL → HTML. Unknown URLs answer 404.
    #[derive(Default)]
    pub(crate) struct FakeSite {
        pages: HashMap<String, String>,
        pub(crate) requests: Mutex<Vec<String>>,
    }

    impl FakeSite {
        pub(crate) fn page(mut self, path: &str, html: impl Into<String>) -> Self {
            self.pages.insert(format!("{}{}", BASE, path), html.into());
            self
        }
    }

    #[async_trait]
    impl PageSource for FakeSite {
        async fn get_text(&self, url: &str) -> Result<String, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    #[async_trait]
    impl PageSource for Arc<FakeSite> {
        async fn get_text(&self, url: &str) -> Result<String, FetchError> {
            (**self).get_text(url).await
        }
    }

    pub(crate) fn listing(links: &[(&str, &str)], next: Option<&str>) -> String {
        let mut html = String::from("<html><body>");
        for (title, href) in links {
            html.push_str(&format!(
                r#"<div class="productGridItem"><h5><a href="{}">{}</a></h5></div>"#,
                href, title
            ));
        }
        if let Some(next) = next {
            html.push_str(&format!(r#"<a class="ajaxAltNext page-link" href="{}">Next</a>"#, next));
        }
        html.push_str("</body></html>");
        html
    }

    pub(crate) fn product(title: &str, price: &str) -> String {
        format!(
            r##"<html><body>
              <h1>{title}</h1>
              <p class="text-price">{price}</p>
              <span class="h6 text-muted">Lemon, Pastry</span>
              <div class="bottleSize">10ml, 50ml</div>
              <div class="vg">70% VG</div>
              <div class="nicotineLevels"><span>Shortfill</span></div>
              <div class="productReviewScore">
                <span class="reviewStars"><span title="4.5"></span></span>
                <a href="#reviews">73 reviews</a>
              </div>
            </body></html>"##
        )
    }

    /// Two product pages, three accepted entries then one, and an empty page 3.
    /// The "from" price on /e-liquids/c fails extraction.
    pub(crate) fn two_page_site() -> FakeSite {
        FakeSite::default()
            .page(
                "/e-liquids/",
                listing(
                    &[
                        ("Lemon Tart by Dinner Lady", "/e-liquids/a"),
                        ("Pink Lemonade by Bar Juice", "/e-liquids/b"),
                        ("Variety Pack by Bundles", "/e-liquids/c"),
                        ("Nic Shot 18mg", "/e-liquids/nicotine-shots/d"),
                    ],
                    Some("/e-liquids/?page=2"),
                ),
            )
            .page(
                "/e-liquids/?page=2",
                listing(&[("Mint by Fresh Co", "/e-liquids/e")], Some("/e-liquids/?page=3")),
            )
            .page("/e-liquids/?page=3", listing(&[], None))
            .page("/e-liquids/a", product("Lemon Tart by Dinner Lady", "£12.99"))
            .page("/e-liquids/b", product("Pink Lemonade by Bar Juice", "£9.99"))
            .page("/e-liquids/c", product("Variety Pack by Bundles", "From £4.99"))
            .page("/e-liquids/e", product("Mint by Fresh Co", "£3.50"))
    }

    pub(crate) fn controller<S: PageSource>(site: S) -> CrawlController<S> {
        let cfg = AppConfig::default();
        let rules =
            CrawlRules::compile(cfg.supplier("vapeclub").unwrap(), &cfg.criteria, "/").unwrap();
        CrawlController::new("vapeclub", SupplierScraper::new(site, rules))
    }

    fn start_url() -> String {
        format!("{}/e-liquids/", BASE)
    }

    async fn crawl(site: FakeSite) -> (CrawlStats, String) {
        let (stats, sink) = controller(site)
            .run(&start_url(), || CsvSink::from_writer(Vec::new()))
            .await
            .unwrap();
        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        (stats, out)
    }

    #[tokio::test]
    async fn test_crawl_two_pages_then_empty() {
        let (stats, out) = crawl(two_page_site()).await;

        assert_eq!(stats.listing_pages, 3);
        assert_eq!(stats.page_transitions, 2);
        assert_eq!(stats.entries_seen, 5);
        assert_eq!(stats.entries_skipped, 1);
        assert_eq!(stats.products_visited, 4);
        assert_eq!(stats.products_failed, 1);
        assert_eq!(stats.rows_written, 3);
        assert!(!stats.aborted);

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[1],
            "Lemon Tart,Dinner Lady,lemon/pastry,10/50,70,0,true,false,https://www.vapeclub.co.uk/e-liquids/a,,12.99,4.5,73"
        );
        assert!(lines[3].starts_with("Mint,Fresh Co,"));
    }

    #[tokio::test]
    async fn test_filtered_entries_are_never_requested() {
        let site = Arc::new(two_page_site());
        controller(Arc::clone(&site))
            .run(&start_url(), || CsvSink::from_writer(Vec::new()))
            .await
            .unwrap();

        let requests = site.requests.lock().unwrap();
        assert_eq!(requests.len(), 7);
        assert!(!requests.iter().any(|u| u.contains("nicotine-shots")));
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_but_keeps_rows() {
        let site = FakeSite::default()
            .page(
                "/e-liquids/",
                listing(&[("Lemon Tart by Dinner Lady", "/e-liquids/a")], Some("/e-liquids/?page=2")),
            )
            .page("/e-liquids/a", product("Lemon Tart by Dinner Lady", "£12.99"));

        let (stats, out) = crawl(site).await;
        assert!(stats.aborted);
        assert_eq!(stats.listing_pages, 2);
        assert_eq!(stats.rows_written, 1);
        assert_eq!(out.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_missing_product_page_is_skipped() {
        let site = FakeSite::default()
            .page(
                "/e-liquids/",
                listing(
                    &[("Gone by Nobody", "/e-liquids/gone"), ("Lemon Tart by Dinner Lady", "/e-liquids/a")],
                    None,
                ),
            )
            .page("/e-liquids/a", product("Lemon Tart by Dinner Lady", "£12.99"));

        let (stats, _) = crawl(site).await;
        assert!(!stats.aborted);
        assert_eq!(stats.products_failed, 1);
        assert_eq!(stats.rows_written, 1);
        assert_eq!(stats.listing_pages, 1);
        assert_eq!(stats.page_transitions, 0);
    }

    #[tokio::test]
    async fn test_unreachable_start_page_opens_no_sink() {
        let mut opened = false;
        let result = controller(FakeSite::default())
            .run(&start_url(), || {
                opened = true;
                CsvSink::from_writer(Vec::new())
            })
            .await;

        let err = format!("{:#}", result.err().unwrap());
        assert!(err.contains("cannot reach start page"), "{}", err);
        assert!(!opened);
    }

    #[tokio::test]
    async fn test_next_link_is_relative_to_current_page() {
        let site = FakeSite::default()
            .page(
                "/e-liquids/",
                listing(&[("Lemon Tart by Dinner Lady", "/e-liquids/a")], Some("?page=2")),
            )
            .page("/e-liquids/?page=2", listing(&[("Mint by Fresh Co", "/e-liquids/e")], None))
            .page("/e-liquids/a", product("Lemon Tart by Dinner Lady", "£12.99"))
            .page("/e-liquids/e", product("Mint by Fresh Co", "£3.50"));

        let (stats, out) = crawl(site).await;
        assert!(!stats.aborted);
        assert_eq!(stats.listing_pages, 2);
        assert_eq!(stats.rows_written, 2);
        assert!(out.lines().nth(2).unwrap().starts_with("Mint,Fresh Co,"));
    }

    #[tokio::test]
    async fn test_self_linking_page_is_crawled_once() {
        let site = Arc::new(
            FakeSite::default()
                .page(
                    "/e-liquids/",
                    listing(&[("Lemon Tart by Dinner Lady", "/e-liquids/a")], Some("/e-liquids/")),
                )
                .page("/e-liquids/a", product("Lemon Tart by Dinner Lady", "£12.99")),
        );
        let (stats, _) = controller(Arc::clone(&site))
            .run(&start_url(), || CsvSink::from_writer(Vec::new()))
            .await
            .unwrap();

        assert_eq!(stats.listing_pages, 1);
        assert_eq!(stats.page_transitions, 0);
        assert_eq!(stats.rows_written, 1);
        assert!(!stats.aborted);
        assert_eq!(site.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_link_back_to_first_page_ends_crawl() {
        let site = FakeSite::default()
            .page(
                "/e-liquids/",
                listing(&[("Lemon Tart by Dinner Lady", "/e-liquids/a")], Some("/e-liquids/?page=2")),
            )
            .page(
                "/e-liquids/?page=2",
                listing(&[("Mint by Fresh Co", "/e-liquids/e")], Some("/e-liquids/")),
            )
            .page("/e-liquids/a", product("Lemon Tart by Dinner Lady", "£12.99"))
            .page("/e-liquids/e", product("Mint by Fresh Co", "£3.50"));

        let (stats, out) = crawl(site).await;
        assert_eq!(stats.listing_pages, 2);
        assert_eq!(stats.page_transitions, 1);
        assert_eq!(stats.rows_written, 2);
        assert_eq!(out.lines().count(), 3);
    }

    /// Accepts the header, then fails every write.
    #[derive(Default)]
    struct FailAfterHeader {
        header_written: bool,
    }

    impl Write for FailAfterHeader {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.header_written {
                return Err(std::io::Error::other("disk full"));
            }
            self.header_written = true;
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_write_errors_do_not_stop_crawl() {
        let (stats, _) = controller(two_page_site())
            .run(&start_url(), || CsvSink::from_writer(FailAfterHeader::default()))
            .await
            .unwrap();

        assert_eq!(stats.listing_pages, 3);
        assert_eq!(stats.page_transitions, 2);
        assert_eq!(stats.products_visited, 4);
        assert_eq!(stats.write_errors, 3);
        assert_eq!(stats.rows_written, 0);
        assert!(!stats.aborted);
    }

    #[test]
    fn test_rerun_is_identical() {
        let (first_stats, first) = tokio_test::block_on(crawl(two_page_site()));
        let (second_stats, second) = tokio_test::block_on(crawl(two_page_site()));
        assert_eq!(first_stats, second_stats);
        assert_eq!(first, second);
    }
}

use crate::config::{CriteriaConfig, SupplierConfig};
use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use url::Url;

use super::filter::VisitFilter;
use super::selectors::Selectors;

/// Everything the crawl needs to know about one supplier, compiled once up
/// front and read-only afterwards.
#[derive(Debug, Clone)]
pub struct CrawlRules {
    pub base_url: Url,
    pub filter: VisitFilter,
    pub selectors: Selectors,
    pub name_noise: Vec<Regex>,
    pub brand_noise: Vec<Regex>,
    pub separator: String,
}

fn compile_noise(kind: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("Invalid {} pattern {:?}", kind, p))
        })
        .collect()
}

impl CrawlRules {
    pub fn compile(
        supplier: &SupplierConfig,
        criteria: &CriteriaConfig,
        separator: &str,
    ) -> Result<Self> {
        let base_url = Url::parse(&supplier.base_url)
            .with_context(|| format!("Invalid base_url {:?}", supplier.base_url))?;

        Ok(Self {
            base_url,
            filter: VisitFilter::new(&supplier.category_marker, &criteria.skip),
            selectors: Selectors::compile(&supplier.selectors)?,
            name_noise: compile_noise("raw_name", &criteria.remove.raw_name)?,
            brand_noise: compile_noise("raw_brand", &criteria.remove.raw_brand)?,
            separator: separator.to_string(),
        })
    }

    /// Absolute URL for a link found on `page_url`. Falls back to the
    /// supplier's base URL when the page URL itself does not parse.
    pub fn resolve(&self, page_url: &str, link: &str) -> Option<String> {
        let base = Url::parse(page_url).unwrap_or_else(|_| self.base_url.clone());
        base.join(link.trim()).ok().map(String::from)
    }
}

use crate::config::SkipCriteria;
use crate::models::ListingEntry;

/// Decides from a listing entry alone whether its product page is worth a
/// request. All matching is case-insensitive.
#[derive(Debug, Clone)]
pub struct VisitFilter {
    category_marker: String,
    skip_url_parts: Vec<String>,
    skip_titles: Vec<String>,
}

impl VisitFilter {
    pub fn new(category_marker: &str, skip: &SkipCriteria) -> Self {
        let lower = |v: &[String]| -> Vec<String> { v.iter().map(|s| s.to_lowercase()).collect() };
        Self {
            category_marker: category_marker.to_lowercase(),
            skip_url_parts: lower(&skip.product_url_part),
            skip_titles: lower(&skip.product_title),
        }
    }

    pub fn should_visit(&self, entry: &ListingEntry) -> bool {
        let link = entry.link.to_lowercase();
        if !link.contains(&self.category_marker) {
            return false;
        }
        if self.skip_url_parts.iter().any(|p| link.contains(p.as_str())) {
            return false;
        }

        let title = entry.title.to_lowercase();
        !self.skip_titles.iter().any(|t| title.contains(t.as_str()))
    }
}

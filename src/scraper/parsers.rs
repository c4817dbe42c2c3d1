use crate::models::{CatalogPage, ListingEntry};
use scraper::{ElementRef, Html};

use super::selectors::Selectors;

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

// ── Listing page ──────────────────────────────────────────────────────────────

pub fn parse_catalog_page(html: &str, sel: &Selectors) -> CatalogPage {
    let doc = Html::parse_document(html);

    let entries = doc
        .select(&sel.listing_item)
        .filter_map(|item| {
            let a = item.select(&sel.listing_link).next()?;
            let link = a.value().attr("href")?;
            Some(ListingEntry {
                title: text_of(a).trim().to_string(),
                link: link.trim().to_string(),
            })
        })
        .collect();

    let next_link = doc
        .select(&sel.next_page)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty());

    CatalogPage { entries, next_link }
}

// ── Product page ──────────────────────────────────────────────────────────────

/// A parsed product detail page with one accessor per HTML region.
///
/// Accessors return `None` when the region is absent and raw, uncleaned text
/// otherwise.
pub struct ProductDocument<'s> {
    doc: Html,
    sel: &'s Selectors,
}

impl<'s> ProductDocument<'s> {
    pub fn parse(html: &str, sel: &'s Selectors) -> Self {
        Self {
            doc: Html::parse_document(html),
            sel,
        }
    }

    fn first_text(&self, selector: &scraper::Selector) -> Option<String> {
        self.doc.select(selector).next().map(text_of)
    }

    pub fn price(&self) -> Option<String> {
        self.first_text(&self.sel.price)
    }

    pub fn title(&self) -> Option<String> {
        self.first_text(&self.sel.title)
    }

    /// The `<dd>` following the flavours `<dt>`.
    pub fn flavours_detail(&self) -> Option<String> {
        let dt = self.doc.select(&self.sel.flavours_term).next()?;
        dt.next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "dd")
            .map(text_of)
    }

    pub fn flavours_summary(&self) -> Option<String> {
        self.first_text(&self.sel.flavours_summary)
    }

    pub fn volumes(&self) -> Option<String> {
        self.first_text(&self.sel.volumes)
    }

    pub fn vg(&self) -> Option<String> {
        self.first_text(&self.sel.vg)
    }

    pub fn strength_labels(&self) -> Option<Vec<String>> {
        let block = self.doc.select(&self.sel.strengths).next()?;
        Some(
            block
                .select(&self.sel.strength_label)
                .map(|s| text_of(s).trim().to_string())
                .collect(),
        )
    }

    /// (zoom link href, img src) inside the image block, if the block exists.
    pub fn image(&self) -> Option<(Option<String>, Option<String>)> {
        let block = self.doc.select(&self.sel.image).next()?;
        let attr = |selector: &scraper::Selector, name: &str| {
            block
                .select(selector)
                .next()
                .and_then(|el| el.value().attr(name))
                .map(str::to_string)
        };
        Some((
            attr(&self.sel.image_zoom_link, "href"),
            attr(&self.sel.image_tag, "src"),
        ))
    }

    /// (stars title attribute, review count text) if the rating widget exists.
    pub fn rating(&self) -> Option<(Option<String>, Option<String>)> {
        let widget = self.doc.select(&self.sel.rating).next()?;
        let stars = widget
            .select(&self.sel.rating_stars)
            .next()
            .and_then(|el| el.value().attr("title"))
            .map(str::to_string);
        let count = widget.select(&self.sel.rating_count).next().map(text_of);
        Some((stars, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;

    fn selectors() -> Selectors {
        Selectors::compile(&SelectorConfig::default()).unwrap()
    }

    const LISTING: &str = r#"
        <html><body>
          <div class="productGridItem"><h5><a href="/e-liquids/dinner-lady/lemon-tart"> Lemon Tart by Dinner Lady </a></h5></div>
          <div class="productGridItem"><h5><a href="/e-liquids/nicotine-shots/shot">Nic Shot</a></h5></div>
          <div class="productGridItem"><h5>No link here</h5></div>
          <ul><li><a class="ajaxAltNext page-link" href="/e-liquids/?page=2">Next</a></li></ul>
        </body></html>"#;

    #[test]
    fn test_parse_catalog_page() {
        let page = parse_catalog_page(LISTING, &selectors());
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.entries[0].title, "Lemon Tart by Dinner Lady");
        assert_eq!(page.entries[0].link, "/e-liquids/dinner-lady/lemon-tart");
        assert_eq!(page.next_link.as_deref(), Some("/e-liquids/?page=2"));
    }

    #[test]
    fn test_parse_empty_catalog_page() {
        let page = parse_catalog_page("<html><body><p>No products</p></body></html>", &selectors());
        assert!(page.entries.is_empty());
        assert_eq!(page.next_link, None);
    }

    #[test]
    fn test_product_regions() {
        let html = r##"
            <h1>Lemon Tart by Dinner Lady</h1>
            <dl><dt title="Eliquid Flavours">Flavours</dt><dd>Lemon, Pastry</dd></dl>
            <div class="nicotineLevels"><span>3mg</span><span> 6mg </span></div>
            <div class="mainProductImage"><img src="/img/small.jpg"></div>
            <div class="productReviewScore">
              <span class="reviewStars"><span title="4.5"></span></span>
              <a href="#reviews">73 reviews</a>
            </div>"##;
        let sel = selectors();
        let doc = ProductDocument::parse(html, &sel);

        assert_eq!(doc.price(), None);
        assert_eq!(doc.title().as_deref(), Some("Lemon Tart by Dinner Lady"));
        assert_eq!(doc.flavours_detail().as_deref(), Some("Lemon, Pastry"));
        assert_eq!(doc.flavours_summary(), None);
        assert_eq!(doc.strength_labels(), Some(vec!["3mg".to_string(), "6mg".to_string()]));
        assert_eq!(doc.image(), Some((None, Some("/img/small.jpg".to_string()))));
        assert_eq!(
            doc.rating(),
            Some((Some("4.5".to_string()), Some("73 reviews".to_string())))
        );
    }
}

//! Compiled CSS selectors for one supplier site.
//!
//! Built from [`SelectorConfig`]; update the config, not this file, when the
//! site markup changes.

use crate::config::SelectorConfig;
use anyhow::Result;
use scraper::Selector;

fn compile(field: &str, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("{} selector {:?}: {:?}", field, css, e))
}

#[derive(Debug, Clone)]
pub struct Selectors {
    pub listing_item: Selector,
    pub listing_link: Selector,
    pub next_page: Selector,
    pub price: Selector,
    pub title: Selector,
    pub flavours_term: Selector,
    pub flavours_summary: Selector,
    pub volumes: Selector,
    pub vg: Selector,
    pub strengths: Selector,
    pub strength_label: Selector,
    pub image: Selector,
    pub image_zoom_link: Selector,
    pub image_tag: Selector,
    pub rating: Selector,
    pub rating_stars: Selector,
    pub rating_count: Selector,
}

impl Selectors {
    pub fn compile(cfg: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            listing_item: compile("listing_item", &cfg.listing_item)?,
            listing_link: compile("listing_link", &cfg.listing_link)?,
            next_page: compile("next_page", &cfg.next_page)?,
            price: compile("price", &cfg.price)?,
            title: compile("title", &cfg.title)?,
            flavours_term: compile("flavours_term", &cfg.flavours_term)?,
            flavours_summary: compile("flavours_summary", &cfg.flavours_summary)?,
            volumes: compile("volumes", &cfg.volumes)?,
            vg: compile("vg", &cfg.vg)?,
            strengths: compile("strengths", &cfg.strengths)?,
            strength_label: compile("strength_label", &cfg.strength_label)?,
            image: compile("image", &cfg.image)?,
            image_zoom_link: compile("image_zoom_link", &cfg.image_zoom_link)?,
            image_tag: compile("image_tag", &cfg.image_tag)?,
            rating: compile("rating", &cfg.rating)?,
            rating_stars: compile("rating_stars", &cfg.rating_stars)?,
            rating_count: compile("rating_count", &cfg.rating_count)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selectors_compile() {
        assert!(Selectors::compile(&SelectorConfig::default()).is_ok());
    }

    #[test]
    fn test_bad_selector_names_field() {
        let cfg = SelectorConfig {
            vg: "div[".into(),
            ..SelectorConfig::default()
        };
        let err = Selectors::compile(&cfg).unwrap_err().to_string();
        assert!(err.starts_with("vg selector"), "{}", err);
    }
}

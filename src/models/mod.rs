use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

// ── Catalog listing ───────────────────────────────────────────────────────────

/// One product as shown on a catalog listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub title: String,
    /// Link exactly as it appears in the markup (usually a relative path).
    pub link: String,
}

/// A parsed page of listed products.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogPage {
    pub entries: Vec<ListingEntry>,
    pub next_link: Option<String>,
}

// ── Output row ────────────────────────────────────────────────────────────────

/// Column order of the scrape artifact. Downstream importers rely on it.
pub const CSV_HEADERS: [&str; 13] = [
    "name",
    "brand",
    "flavours",
    "volumes",
    "vg",
    "strengths",
    "is_shortfill",
    "is_salt_nic",
    "purchase_url",
    "image_url",
    "price",
    "rating",
    "num_ratings",
];

/// A fully cleaned product, one row of the scrape artifact.
///
/// Field order matches [`CSV_HEADERS`]. Multi-valued fields are already
/// joined with the configured separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    pub name: String,
    pub brand: String,
    pub flavours: String,
    pub volumes: String,
    pub vg: String,
    pub strengths: String,
    #[serde(deserialize_with = "loose_bool")]
    pub is_shortfill: bool,
    #[serde(deserialize_with = "loose_bool")]
    pub is_salt_nic: bool,
    pub purchase_url: String,
    pub image_url: String,
    pub price: String,
    pub rating: String,
    pub num_ratings: String,
}

/// Accepts `true`, `True`, `TRUE` (and the same for false).
fn loose_bool<'de, D>(de: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(de)?;
    match raw.trim().to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(serde::de::Error::custom(format!("not a boolean: {:?}", other))),
    }
}

// ── Extraction failures ───────────────────────────────────────────────────────

/// Product fields whose absence or malformation aborts extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Price,
    Title,
    Flavours,
    Volumes,
    Vg,
    Strengths,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Field::Price => "price",
            Field::Title => "name/brand",
            Field::Flavours => "flavours",
            Field::Volumes => "volumes",
            Field::Vg => "vg",
            Field::Strengths => "strengths",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The HTML region was not on the page.
    MissingHtml,
    /// The region was there but its content could not be cleaned.
    BadFormat,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::MissingHtml => f.write_str("missing-html"),
            Stage::BadFormat => f.write_str("bad-format"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExtractionFailure {
    #[error("cannot find HTML for '{0}'")]
    MissingHtml(Field),
    #[error("unaccepted format for '{0}'")]
    BadFormat(Field),
}

impl ExtractionFailure {
    pub fn field(&self) -> Field {
        match self {
            Self::MissingHtml(f) | Self::BadFormat(f) => *f,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::MissingHtml(_) => Stage::MissingHtml,
            Self::BadFormat(_) => Stage::BadFormat,
        }
    }
}

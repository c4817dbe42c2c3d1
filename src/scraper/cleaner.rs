//! Field cleaners: raw text in, normalised cell value out.
//!
//! Every cleaner returns `None` when the input cannot be normalised. That is
//! an expected outcome for inconsistently formatted product pages, so the
//! caller skips the product rather than treating it as an error.

use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static PRICE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\.\d+").unwrap());
static BY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bby\b").unwrap());
static FLAVOUR_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,/]").unwrap());
static ML_UNIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)ml").unwrap());
static MG_UNIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)mg").unwrap());
static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static RATING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(\.\d+)?").unwrap());

/// Bottles above this many ml are shortfills.
const SHORTFILL_MIN_ML: u32 = 10;

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Collapse runs of whitespace to single spaces and trim.
pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Dedupe, sort numerically where possible (text after numbers), then join.
/// "12", "3", "6" → "3/6/12"
fn join_numeric_sorted(values: Vec<String>, sep: &str) -> String {
    let mut unique: Vec<String> = values
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    unique.sort_by(|a, b| match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    });
    unique.join(sep)
}

// ── Cleaners ──────────────────────────────────────────────────────────────────

/// "£12.99" → "12.99". Aggregate "From £12.99" pages list several variants
/// and are not a single product.
pub fn clean_price(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    if lower.contains("from") {
        return None;
    }
    PRICE.find(&lower).map(|m| m.as_str().to_string())
}

/// Split a title on its last standalone "by" into (name, brand), stripping
/// the noise patterns from each half.
/// "Lemon Tart 10ml E-Liquid by Dinner Lady" → ("Lemon Tart", "Dinner Lady")
pub fn clean_name_brand(
    title: &str,
    name_noise: &[Regex],
    brand_noise: &[Regex],
) -> Option<(String, String)> {
    let by = BY.find_iter(title).last()?;

    let mut raw_name = title[..by.start()].to_string();
    let mut raw_brand = title[by.end()..].to_string();

    for re in name_noise {
        raw_name = re.replace_all(&raw_name, "").into_owned();
    }
    for re in brand_noise {
        raw_brand = re.replace_all(&raw_brand, "").into_owned();
    }

    let name = collapse_ws(&raw_name);
    let brand = collapse_ws(&raw_brand);
    if name.is_empty() || brand.is_empty() {
        return None;
    }
    Some((name, brand))
}

/// Union of the flavour list and the flavour summary, lowercased, sorted.
/// ("Lemon, Pastry", "pastry/vanilla") → "lemon/pastry/vanilla"
pub fn clean_flavours(detail: Option<&str>, summary: Option<&str>, sep: &str) -> Option<String> {
    if detail.is_none() && summary.is_none() {
        return None;
    }

    let flavours: BTreeSet<String> = [detail, summary]
        .into_iter()
        .flatten()
        .flat_map(|text| FLAVOUR_SPLIT.split(text))
        .map(|f| collapse_ws(f).to_lowercase())
        .filter(|f| !f.is_empty())
        .collect();

    if flavours.is_empty() {
        return None;
    }
    Some(flavours.into_iter().collect::<Vec<_>>().join(sep))
}

/// "10ml, 50ml" → ("10/50", true). Composite bundles like "50+10ml" are
/// rejected.
pub fn clean_volumes(text: &str, sep: &str) -> Option<(String, bool)> {
    if text.trim().is_empty() {
        return None;
    }

    let mut volumes = Vec::new();
    let mut is_shortfill = false;
    for token in text.split(',') {
        let token = ML_UNIT.replace_all(token.trim(), "");
        let ml: u32 = token.trim().parse().ok()?;
        if ml > SHORTFILL_MIN_ML {
            is_shortfill = true;
        }
        volumes.push(ml.to_string());
    }

    Some((join_numeric_sorted(volumes, sep), is_shortfill))
}

/// First run of digits: "VG 70%" → "70"
pub fn clean_vg(text: &str) -> Option<String> {
    DIGITS.find(text).map(|m| m.as_str().to_string())
}

/// Nicotine strengths from their labels: ["3mg", "6mg"] → "3/6".
///
/// A lone "Shortfill" label means 0mg; a lone nicotine "shot" label is an
/// add-on product and is rejected.
pub fn clean_strengths(labels: &[String], sep: &str) -> Option<String> {
    if labels.is_empty() {
        return None;
    }

    if let [only] = labels {
        let lower = only.to_lowercase();
        if lower.contains("shortfill") {
            return Some("0".to_string());
        }
        if lower.contains("shot") {
            return None;
        }
    }

    let mut strengths = Vec::with_capacity(labels.len());
    for label in labels {
        let s = collapse_ws(&MG_UNIT.replace_all(label, ""));
        if s.is_empty() {
            return None;
        }
        strengths.push(s);
    }

    Some(join_numeric_sorted(strengths, sep))
}

pub fn is_salt_nic(title: &str) -> bool {
    title.to_lowercase().contains("salt")
}

/// Zoomable images link to the full-size file; small ones only have `src`.
/// Missing images are allowed and become an empty cell.
pub fn pick_image_url(zoom_href: Option<&str>, img_src: Option<&str>) -> String {
    zoom_href
        .or(img_src)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// (rating, count) from the star widget title and the review link text.
/// Anything unrecognisable falls back to ("0", "0"), same as unrated.
pub fn clean_rating(stars_title: Option<&str>, count_text: Option<&str>) -> (String, String) {
    let unrated = || ("0".to_string(), "0".to_string());

    let Some(rating) = stars_title.and_then(|t| RATING.find(t)) else {
        return unrated();
    };
    let Some(count) = count_text.and_then(|t| DIGITS.find(t)) else {
        return unrated();
    };

    (rating.as_str().to_string(), count.as_str().to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Page extractor: product page → [`OutputRow`].
//!
//! Fields are checked in a fixed order (price, title, flavours, volumes, vg,
//! strengths) and the first missing or malformed one aborts the product.
//! Salt flag, purchase URL, image and rating always have a value.

use crate::models::{ExtractionFailure, Field, OutputRow};

use super::cleaner;
use super::parsers::ProductDocument;
use super::rules::CrawlRules;

fn require<T>(value: Option<T>, field: Field) -> Result<T, ExtractionFailure> {
    value.ok_or(ExtractionFailure::MissingHtml(field))
}

fn clean<T>(value: Option<T>, field: Field) -> Result<T, ExtractionFailure> {
    value.ok_or(ExtractionFailure::BadFormat(field))
}

pub fn extract(
    doc: &ProductDocument<'_>,
    url: &str,
    rules: &CrawlRules,
) -> Result<OutputRow, ExtractionFailure> {
    let sep = rules.separator.as_str();

    let raw_price = require(doc.price(), Field::Price)?;
    let price = clean(cleaner::clean_price(&raw_price), Field::Price)?;

    let raw_title = require(doc.title(), Field::Title)?;
    let (name, brand) = clean(
        cleaner::clean_name_brand(&raw_title, &rules.name_noise, &rules.brand_noise),
        Field::Title,
    )?;

    let detail = doc.flavours_detail();
    let summary = doc.flavours_summary();
    if detail.is_none() && summary.is_none() {
        return Err(ExtractionFailure::MissingHtml(Field::Flavours));
    }
    let flavours = clean(
        cleaner::clean_flavours(detail.as_deref(), summary.as_deref(), sep),
        Field::Flavours,
    )?;

    let raw_volumes = require(doc.volumes(), Field::Volumes)?;
    let (volumes, is_shortfill) = clean(cleaner::clean_volumes(&raw_volumes, sep), Field::Volumes)?;

    let raw_vg = require(doc.vg(), Field::Vg)?;
    let vg = clean(cleaner::clean_vg(&raw_vg), Field::Vg)?;

    let labels = require(doc.strength_labels(), Field::Strengths)?;
    let strengths = clean(cleaner::clean_strengths(&labels, sep), Field::Strengths)?;

    let image_url = match doc.image() {
        Some((zoom, img)) => {
            let picked = cleaner::pick_image_url(zoom.as_deref(), img.as_deref());
            if picked.is_empty() {
                picked
            } else {
                rules.resolve(url, &picked).unwrap_or(picked)
            }
        }
        None => String::new(),
    };

    let (rating, num_ratings) = match doc.rating() {
        Some((stars, count)) => cleaner::clean_rating(stars.as_deref(), count.as_deref()),
        None => ("0".to_string(), "0".to_string()),
    };

    Ok(OutputRow {
        name,
        brand,
        flavours,
        volumes,
        vg,
        strengths,
        is_shortfill,
        is_salt_nic: cleaner::is_salt_nic(&raw_title),
        purchase_url: url.to_string(),
        image_url,
        price,
        rating,
        num_ratings,
    })
}

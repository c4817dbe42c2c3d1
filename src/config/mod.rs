use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub criteria: CriteriaConfig,
    #[serde(default = "default_suppliers")]
    pub suppliers: BTreeMap<String, SupplierConfig>,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fixed pause before every request. Zero disables it.
    #[serde(default)]
    pub request_delay_ms: u64,

    #[serde(default)]
    pub jitter_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Where scrape artifacts are written
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Joins multi-valued fields (flavours, volumes, strengths) into one cell.
    #[serde(default = "default_separator")]
    pub separator: String,
}

/// Catalog store used by `import` and `stats`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CriteriaConfig {
    #[serde(default)]
    pub skip: SkipCriteria,
    #[serde(default)]
    pub remove: RemoveCriteria,
}

/// Substrings that stop a listed product from being visited.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SkipCriteria {
    #[serde(default = "default_skip_url_parts")]
    pub product_url_part: Vec<String>,
    #[serde(default = "default_skip_titles")]
    pub product_title: Vec<String>,
}

/// Regex patterns stripped from the raw name and brand halves of a title.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoveCriteria {
    #[serde(default = "default_remove_name")]
    pub raw_name: Vec<String>,
    #[serde(default = "default_remove_brand")]
    pub raw_brand: Vec<String>,
}

/// One supported supplier site.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SupplierConfig {
    /// Fallback base for relative links when the page URL itself is unusable.
    pub base_url: String,
    pub start_url: String,
    /// Product links that do not contain this (case-insensitive) are ignored.
    pub category_marker: String,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// CSS selectors locating each HTML region the scraper reads.
///
/// A markup change on the supplier site should only ever need edits here.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub listing_item: String,
    pub listing_link: String,
    pub next_page: String,
    pub price: String,
    pub title: String,
    /// `<dt>` whose following `<dd>` lists flavours.
    pub flavours_term: String,
    pub flavours_summary: String,
    pub volumes: String,
    pub vg: String,
    pub strengths: String,
    /// Individual strength labels, relative to `strengths`.
    pub strength_label: String,
    pub image: String,
    pub image_zoom_link: String,
    pub image_tag: String,
    pub rating: String,
    pub rating_stars: String,
    pub rating_count: String,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "eliquid-scraper/0.1 (product catalog research)".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("media/scrapes")
}
fn default_separator() -> String {
    "/".to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/catalog.duckdb")
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_skip_url_parts() -> Vec<String> {
    strings(&[
        "nicotine-shots",
        "vape-pods",
        "flavour-concentrates-diy",
        "vaping-accessories",
        "vape-kits",
    ])
}
fn default_skip_titles() -> Vec<String> {
    strings(&["shot", "disposable", "pod", "concentrate", "cbd"])
}
fn default_remove_name() -> Vec<String> {
    strings(&[
        "eliquid",
        "e-liquid",
        "hybrid salt",
        "nic salt",
        "shortfill",
        r"\d+ml",
    ])
}
fn default_remove_brand() -> Vec<String> {
    strings(&[
        "nic salts",
        r"\d{2}/\d{2}", // e.g. 70/30
        r"- \d+ml",
        r"\d+ml",
        "any tank",
    ])
}

fn default_suppliers() -> BTreeMap<String, SupplierConfig> {
    let mut map = BTreeMap::new();
    map.insert(
        "vapeclub".to_string(),
        SupplierConfig {
            base_url: "https://www.vapeclub.co.uk".to_string(),
            start_url: "https://www.vapeclub.co.uk/e-liquids/".to_string(),
            category_marker: "e-liquids".to_string(),
            selectors: SelectorConfig::default(),
        },
    );
    map
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            request_delay_ms: 0,
            jitter_ms: 0,
            user_agent: default_user_agent(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            separator: default_separator(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for SkipCriteria {
    fn default() -> Self {
        Self {
            product_url_part: default_skip_url_parts(),
            product_title: default_skip_titles(),
        }
    }
}

impl Default for RemoveCriteria {
    fn default() -> Self {
        Self {
            raw_name: default_remove_name(),
            raw_brand: default_remove_brand(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            listing_item: ".productGridItem".into(),
            listing_link: "h5 a".into(),
            next_page: "a.ajaxAltNext.page-link".into(),
            price: "p.text-price".into(),
            title: "h1".into(),
            flavours_term: r#"dt[title="Eliquid Flavours"]"#.into(),
            flavours_summary: "span.h6.text-muted".into(),
            volumes: "div.bottleSize".into(),
            vg: "div.vg".into(),
            strengths: "div.nicotineLevels".into(),
            strength_label: "span".into(),
            image: "div.mainProductImage".into(),
            image_zoom_link: "a".into(),
            image_tag: "img".into(),
            rating: "div.productReviewScore".into(),
            rating_stars: "span.reviewStars span".into(),
            rating_count: r##"a[href="#reviews"]"##.into(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("ELIQUID").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        Ok(app_cfg)
    }

    pub fn supplier(&self, id: &str) -> Option<&SupplierConfig> {
        self.suppliers.get(id)
    }

    pub fn supplier_ids(&self) -> Vec<&str> {
        self.suppliers.keys().map(|k| k.as_str()).collect()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig::default(),
            output: OutputConfig::default(),
            storage: StorageConfig::default(),
            criteria: CriteriaConfig::default(),
            suppliers: default_suppliers(),
        }
    }
}

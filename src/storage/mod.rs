use crate::models::OutputRow;
use anyhow::{Context, Result};
use chrono::Utc;
use duckdb::{params, Connection, ToSql};
use std::path::Path;
use tracing::info;

// ── Schema ────────────────────────────────────────────────────────────────────

const DDL: &str = r#"
CREATE SEQUENCE IF NOT EXISTS brand_ids;
CREATE SEQUENCE IF NOT EXISTS supplier_ids;
CREATE SEQUENCE IF NOT EXISTS flavour_ids;
CREATE SEQUENCE IF NOT EXISTS strength_ids;
CREATE SEQUENCE IF NOT EXISTS product_ids;
CREATE SEQUENCE IF NOT EXISTS variant_ids;
CREATE SEQUENCE IF NOT EXISTS supplier_info_ids;

CREATE TABLE IF NOT EXISTS brands (
    id      BIGINT PRIMARY KEY DEFAULT nextval('brand_ids'),
    name    VARCHAR NOT NULL UNIQUE CHECK (name <> '')
);

CREATE TABLE IF NOT EXISTS suppliers (
    id      BIGINT PRIMARY KEY DEFAULT nextval('supplier_ids'),
    name    VARCHAR NOT NULL UNIQUE CHECK (name <> '')
);

CREATE TABLE IF NOT EXISTS flavours (
    id      BIGINT PRIMARY KEY DEFAULT nextval('flavour_ids'),
    name    VARCHAR NOT NULL UNIQUE CHECK (name <> '')
);

-- mg/ml
CREATE TABLE IF NOT EXISTS strengths (
    id        BIGINT PRIMARY KEY DEFAULT nextval('strength_ids'),
    strength  BIGINT NOT NULL UNIQUE CHECK (strength >= 0)
);

CREATE TABLE IF NOT EXISTS products (
    id        BIGINT PRIMARY KEY DEFAULT nextval('product_ids'),
    name      VARCHAR NOT NULL CHECK (name <> ''),
    brand_id  BIGINT NOT NULL REFERENCES brands (id),
    UNIQUE (name, brand_id)
);

CREATE TABLE IF NOT EXISTS product_flavours (
    product_id  BIGINT NOT NULL REFERENCES products (id),
    flavour_id  BIGINT NOT NULL REFERENCES flavours (id),
    PRIMARY KEY (product_id, flavour_id)
);

CREATE TABLE IF NOT EXISTS product_variants (
    id            BIGINT PRIMARY KEY DEFAULT nextval('variant_ids'),
    product_id    BIGINT NOT NULL REFERENCES products (id),
    volume        BIGINT NOT NULL CHECK (volume > 0),
    vg            BIGINT NOT NULL CHECK (vg BETWEEN 0 AND 100),
    is_shortfill  BOOLEAN NOT NULL,
    is_salt_nic   BOOLEAN NOT NULL,
    UNIQUE (product_id, volume, vg, is_shortfill, is_salt_nic)
);

CREATE TABLE IF NOT EXISTS variant_strengths (
    variant_id   BIGINT NOT NULL REFERENCES product_variants (id),
    strength_id  BIGINT NOT NULL REFERENCES strengths (id),
    PRIMARY KEY (variant_id, strength_id)
);

CREATE TABLE IF NOT EXISTS supplier_info (
    id            BIGINT PRIMARY KEY DEFAULT nextval('supplier_info_ids'),
    variant_id    BIGINT NOT NULL REFERENCES product_variants (id),
    supplier_id   BIGINT NOT NULL REFERENCES suppliers (id),
    purchase_url  VARCHAR NOT NULL,
    image_url     VARCHAR NOT NULL DEFAULT '',
    price         DECIMAL(8, 2) NOT NULL,
    rating        DOUBLE NOT NULL DEFAULT 0,
    num_ratings   BIGINT NOT NULL DEFAULT 0,
    updated_at    TIMESTAMP NOT NULL,
    UNIQUE (variant_id, supplier_id)
);

CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL
);
"#;

/// Tables reported by `stats`, in display order.
pub const TABLES: [&str; 6] = [
    "brands",
    "suppliers",
    "flavours",
    "products",
    "product_variants",
    "supplier_info",
];

// ── Row parsing ───────────────────────────────────────────────────────────────

fn split_multi<'a>(cell: &'a str, sep: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    cell.split(sep).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_num<T: std::str::FromStr>(column: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} is not a number: {:?}", column, value))
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct Repository {
    conn: Connection,
}

/// `SELECT id` first, `INSERT … RETURNING id` if nothing matched.
fn get_or_create(conn: &Connection, select: &str, insert: &str, p: &[&dyn ToSql]) -> Result<i64> {
    match conn.query_row(select, p, |r| r.get(0)) {
        Ok(id) => return Ok(id),
        Err(duckdb::Error::QueryReturnedNoRows) => {}
        Err(e) => return Err(e.into()),
    }
    Ok(conn.query_row(insert, p, |r| r.get(0))?)
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running migrations…");
        self.conn.execute_batch(DDL).context("DDL failed")?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?)",
            params![Utc::now().naive_utc()],
        )?;
        info!("Migrations done.");
        Ok(())
    }

    pub fn get_or_create_supplier(&self, name: &str) -> Result<i64> {
        get_or_create(
            &self.conn,
            "SELECT id FROM suppliers WHERE name = ?",
            "INSERT INTO suppliers (name) VALUES (?) RETURNING id",
            params![name],
        )
        .with_context(|| format!("supplier {:?}", name))
    }

    /// Map one artifact row onto the catalog. All-or-nothing per row.
    ///
    /// Creates one variant per listed volume. Supplier info is keyed on
    /// (variant, supplier) and refreshed with the row's price and rating.
    pub fn import_row(&self, supplier_id: i64, row: &OutputRow, sep: &str) -> Result<()> {
        let vg: i64 = parse_num("vg", &row.vg)?;
        let price: f64 = parse_num("price", &row.price)?;
        let rating: f64 = parse_num("rating", &row.rating)?;
        let num_ratings: i64 = parse_num("num_ratings", &row.num_ratings)?;
        let volumes = split_multi(&row.volumes, sep)
            .map(|v| parse_num::<i64>("volumes", v))
            .collect::<Result<Vec<_>>>()?;
        let strengths = split_multi(&row.strengths, sep)
            .map(|s| parse_num::<i64>("strengths", s))
            .collect::<Result<Vec<_>>>()?;
        if volumes.is_empty() {
            anyhow::bail!("no volumes");
        }

        let tx = self.conn.unchecked_transaction()?;

        let brand_id = get_or_create(
            &tx,
            "SELECT id FROM brands WHERE name = ?",
            "INSERT INTO brands (name) VALUES (?) RETURNING id",
            params![row.brand],
        )
        .context("brand")?;

        let product_id = get_or_create(
            &tx,
            "SELECT id FROM products WHERE name = ? AND brand_id = ?",
            "INSERT INTO products (name, brand_id) VALUES (?, ?) RETURNING id",
            params![row.name, brand_id],
        )
        .context("product")?;

        for flavour in split_multi(&row.flavours, sep) {
            let flavour = flavour.to_lowercase();
            let flavour_id = get_or_create(
                &tx,
                "SELECT id FROM flavours WHERE name = ?",
                "INSERT INTO flavours (name) VALUES (?) RETURNING id",
                params![flavour],
            )
            .context("flavours")?;
            tx.execute(
                "INSERT OR IGNORE INTO product_flavours (product_id, flavour_id) VALUES (?, ?)",
                params![product_id, flavour_id],
            )?;
        }

        let mut strength_ids = Vec::with_capacity(strengths.len());
        for &mg in &strengths {
            strength_ids.push(
                get_or_create(
                    &tx,
                    "SELECT id FROM strengths WHERE strength = ?",
                    "INSERT INTO strengths (strength) VALUES (?) RETURNING id",
                    params![mg],
                )
                .context("strengths")?,
            );
        }

        let now = Utc::now().naive_utc();
        for volume in volumes {
            let is_shortfill = row.is_shortfill && volume > 10;
            let variant_id = get_or_create(
                &tx,
                "SELECT id FROM product_variants
                 WHERE product_id = ? AND volume = ? AND vg = ? AND is_shortfill = ? AND is_salt_nic = ?",
                "INSERT INTO product_variants (product_id, volume, vg, is_shortfill, is_salt_nic)
                 VALUES (?, ?, ?, ?, ?) RETURNING id",
                params![product_id, volume, vg, is_shortfill, row.is_salt_nic],
            )
            .context("variant")?;

            for &strength_id in &strength_ids {
                tx.execute(
                    "INSERT OR IGNORE INTO variant_strengths (variant_id, strength_id) VALUES (?, ?)",
                    params![variant_id, strength_id],
                )?;
            }

            tx.execute(
                r#"INSERT INTO supplier_info
                       (variant_id, supplier_id, purchase_url, image_url, price, rating, num_ratings, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT (variant_id, supplier_id) DO UPDATE SET
                       purchase_url = excluded.purchase_url,
                       image_url    = excluded.image_url,
                       price        = excluded.price,
                       rating       = excluded.rating,
                       num_ratings  = excluded.num_ratings,
                       updated_at   = excluded.updated_at"#,
                params![
                    variant_id,
                    supplier_id,
                    row.purchase_url,
                    row.image_url,
                    price,
                    rating,
                    num_ratings,
                    now,
                ],
            )
            .context("supplier info")?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn count(&self, table: &str) -> Result<i64> {
        anyhow::ensure!(TABLES.contains(&table), "unknown table {:?}", table);
        let mut s = self.conn.prepare(&format!("SELECT COUNT(*) FROM {}", table))?;
        Ok(s.query_row([], |r| r.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> Repository {
        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations().unwrap();
        repo
    }

    fn row() -> OutputRow {
        OutputRow {
            name: "Lemon Tart".into(),
            brand: "Dinner Lady".into(),
            flavours: "lemon/pastry".into(),
            volumes: "10/50".into(),
            vg: "70".into(),
            strengths: "0/3".into(),
            is_shortfill: true,
            is_salt_nic: false,
            purchase_url: "https://www.vapeclub.co.uk/e-liquids/lemon-tart".into(),
            image_url: String::new(),
            price: "12.99".into(),
            rating: "4.5".into(),
            num_ratings: "73".into(),
        }
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let repo = repo();
        repo.run_migrations().unwrap();
        assert_eq!(repo.count("brands").unwrap(), 0);
    }

    #[test]
    fn test_import_row_get_or_create() {
        let repo = repo();
        let supplier = repo.get_or_create_supplier("Vape Club").unwrap();
        assert_eq!(repo.get_or_create_supplier("Vape Club").unwrap(), supplier);

        repo.import_row(supplier, &row(), "/").unwrap();
        repo.import_row(supplier, &row(), "/").unwrap();

        assert_eq!(repo.count("brands").unwrap(), 1);
        assert_eq!(repo.count("products").unwrap(), 1);
        assert_eq!(repo.count("flavours").unwrap(), 2);
        assert_eq!(repo.count("product_variants").unwrap(), 2);
        assert_eq!(repo.count("supplier_info").unwrap(), 2);
    }

    #[test]
    fn test_bad_row_leaves_no_trace() {
        let repo = repo();
        let supplier = repo.get_or_create_supplier("Vape Club").unwrap();
        let mut bad = row();
        bad.vg = "120".into();

        assert!(repo.import_row(supplier, &bad, "/").is_err());
        assert_eq!(repo.count("brands").unwrap(), 0);
        assert_eq!(repo.count("products").unwrap(), 0);

        bad.vg = "max".into();
        let err = repo.import_row(supplier, &bad, "/").unwrap_err().to_string();
        assert!(err.contains("vg"), "{}", err);
    }

    #[test]
    fn test_count_rejects_unknown_table() {
        assert!(repo().count("schema_version; DROP TABLE brands").is_err());
    }
}

mod config;
mod loader;
mod models;
mod pipeline;
mod scraper;
mod sink;
mod storage;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::loader::{discover_csv_files, import_artifact, supplier_from_filename};
use crate::pipeline::Pipeline;
use crate::storage::{Repository, TABLES};

#[derive(Parser)]
#[command(name = "eliquid-scraper", about = "E-liquid supplier catalog scraper", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl supplier catalogs and write one CSV per supplier
    Scrape {
        /// Supplier identifiers, e.g. vapeclub
        #[arg(required = true)]
        suppliers: Vec<String>,
    },

    /// List supported suppliers
    Suppliers,

    /// Import scrape CSVs (a file or a directory of them) into the catalog
    Import {
        path: PathBuf,

        /// Supplier name to record; defaults to the id in the filename
        #[arg(short, long)]
        supplier: Option<String>,
    },

    /// Show catalog statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "eliquid_scraper=info,warn",
        1 => "eliquid_scraper=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Scrape { suppliers } => {
            let stats = Pipeline::new(config).run(&suppliers).await?;
            info!(
                "Done: {} suppliers requested, {} unknown, {} failed, {} rows written",
                stats.suppliers_requested,
                stats.suppliers_unknown,
                stats.suppliers_failed,
                stats.rows_written
            );
            for path in &stats.artifacts {
                println!("{}", path.display());
            }
        }

        Command::Suppliers => {
            for id in config.supplier_ids() {
                if let Some(s) = config.supplier(id) {
                    println!("  {:<12} {}", id, s.start_url);
                }
            }
        }

        Command::Import { path, supplier } => {
            let _t = utils::Timer::start("CSV import");
            let repo = Repository::open(&config.storage.db_path)?;
            repo.run_migrations()?;

            let files = if path.is_dir() {
                discover_csv_files(&path)?
            } else {
                vec![path.clone()]
            };
            info!("Found {} CSV files in {:?}", files.len(), path);

            let (mut imported, mut failed) = (0usize, 0usize);
            for file in &files {
                let Some(name) = supplier.clone().or_else(|| supplier_from_filename(file)) else {
                    error!("No supplier for {:?}; pass --supplier", file);
                    continue;
                };
                match import_artifact(&repo, file, &name, &config.output.separator) {
                    Ok(s) => {
                        imported += s.imported;
                        failed += s.failed;
                    }
                    Err(e) => error!("Error importing {:?}: {:#}", file, e),
                }
            }

            info!("Done: {} rows imported, {} rows failed", imported, failed);
        }

        Command::Stats => {
            let repo = Repository::open(&config.storage.db_path)?;
            repo.run_migrations()?;
            println!("─────────────────────────────────");
            println!("  E-liquid catalog");
            println!("─────────────────────────────────");
            for table in TABLES {
                println!("  {:<17}: {}", table, repo.count(table)?);
            }
            println!("─────────────────────────────────");
        }
    }

    Ok(())
}

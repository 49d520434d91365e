mod config;
mod crosstab;
mod error;
mod export;
mod models;
mod pipeline;
mod scraper;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::models::ProductRecord;
use crate::pipeline::{Pipeline, RunReport};
use crate::scraper::inventory::parse_inventory;
use crate::scraper::strategy::FallbackChain;

#[derive(Parser)]
#[command(name = "sanmar-inventory", about = "SanMar product search and inventory crosstabs", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Search a category, fetch inventory for every hit and write CSV exports
    Run {
        /// Search text, e.g. "polo"
        query: String,

        #[arg(long, env = "SANMAR_USERNAME")]
        username: Option<String>,

        #[arg(long, env = "SANMAR_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Directory for the CSV files (default from config: exports/)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Search only and list the products found
    Search {
        query: String,

        #[arg(long, env = "SANMAR_USERNAME")]
        username: Option<String>,

        #[arg(long, env = "SANMAR_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Parse a saved response body offline
    Parse {
        file: PathBuf,

        /// Body format; guessed from the file extension when omitted
        #[arg(short, long, value_enum)]
        format: Option<BodyFormat>,

        /// Product code to label an inventory payload with
        #[arg(long, default_value = "UNKNOWN")]
        code: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BodyFormat {
    /// findProducts.json search response
    Json,
    /// HTML search results page
    Html,
    /// checkInventoryJson payload
    Inventory,
}

impl BodyFormat {
    fn guess(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => BodyFormat::Json,
            _ => BodyFormat::Html,
        }
    }
}

fn apply_credentials(config: &mut AppConfig, username: Option<String>, password: Option<String>) {
    if username.is_some() {
        config.auth.username = username;
    }
    if password.is_some() {
        config.auth.password = password;
    }
}

fn print_products(products: &[ProductRecord]) {
    if products.is_empty() {
        println!("No products found.");
        return;
    }
    println!("{} products:", products.len());
    for p in products {
        println!("  {:<10} {}  {}", p.code, p.name, p.url);
    }
}

fn print_summary(query: &str, report: &RunReport) {
    let summary = report.summary();
    let login = if report.auth.is_confirmed() { "confirmed" } else { "unconfirmed" };
    println!("─────────────────────────────────");
    println!("  SanMar inventory: {}", query);
    println!("─────────────────────────────────");
    println!("  Login          : {}", login);
    println!("  Search hits    : {}", utils::fmt_number(report.products_found as u64));
    println!("  Products       : {}", utils::fmt_number(summary.total_products as u64));
    println!("  Variants       : {}", utils::fmt_number(summary.total_variants as u64));
    println!("  Total stock    : {}", utils::fmt_number(summary.total_stock));
    println!("  In stock       : {}", utils::fmt_number(summary.in_stock_products as u64));
    println!("  Skipped        : {}", report.skipped);
    println!("─────────────────────────────────");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "sanmar_inventory=info,warn",
        1 => "sanmar_inventory=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;

    match cli.command {
        Command::Run {
            query,
            username,
            password,
            out_dir,
        } => {
            apply_credentials(&mut config, username, password);
            if let Some(dir) = out_dir {
                config.export.out_dir = dir;
            }
            let out_dir = config.export.out_dir.clone();
            let write_detailed = config.export.write_detailed;

            let report = {
                let _t = utils::Timer::start("Inventory run");
                Pipeline::new(config).run(&query).await?
            };

            print_summary(&query, &report);

            if report.records.is_empty() {
                info!("Nothing to export");
                return Ok(());
            }

            let at = chrono::Local::now().naive_local();
            let paths = export::export_all(&report.records, &query, &out_dir, write_detailed, at)?;
            for path in &paths {
                println!("  wrote {}", path.display());
            }
        }

        Command::Search {
            query,
            username,
            password,
        } => {
            apply_credentials(&mut config, username, password);
            let products = Pipeline::new(config).search(&query).await?;
            print_products(&products);
        }

        Command::Parse { file, format, code } => {
            let body = std::fs::read_to_string(&file)
                .with_context(|| format!("Could not read {:?}", file))?;

            match format.unwrap_or_else(|| BodyFormat::guess(&file)) {
                BodyFormat::Json => print_products(&FallbackChain::json().products(&body)),
                BodyFormat::Html => print_products(&FallbackChain::html().products(&body)),
                BodyFormat::Inventory => {
                    let record = parse_inventory(&code, &body)
                        .with_context(|| format!("{:?} is not an inventory payload", file))?;
                    println!("{} {} (base {})", record.product_code, record.product_name, record.base_product);
                    for v in record.variants() {
                        println!("  {:<14} {:<6} {:<20} {}", v.variant_code, v.size, v.color, v.stock_level);
                    }
                    println!("  total stock: {}", utils::fmt_number(record.total_stock()));
                }
            }
        }
    }

    Ok(())
}

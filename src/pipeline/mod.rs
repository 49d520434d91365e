//! Pipeline orchestrator: ties login → search → inventory together.
//!
//! ## Run
//!
//! `run(query)`:
//!   1. Log in (or decide to carry on without a confirmed session)
//!   2. Category search: JSON API, HTML page as fallback
//!   3. For each product, in search order, fetch its inventory one at a time
//!      with a fixed pause in between. Products whose inventory can't be
//!      fetched or parsed are skipped, never fatal.

use crate::config::AppConfig;
use crate::models::{AuthStatus, InventoryRecord, ProductRecord};
use crate::scraper::inventory::inventory_from_response;
use crate::scraper::{search_category, InventorySource, SanmarScraper};
use anyhow::{bail, Context, Result};
use tracing::{info, warn};

pub struct Pipeline {
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    fn scraper(&self) -> Result<SanmarScraper> {
        SanmarScraper::new(&self.config.vendor).context("Failed to build HTTP client")
    }

    pub async fn run(&self, query: &str) -> Result<RunReport> {
        let scraper = self.scraper()?;

        info!("=== Step 1: Logging in ===");
        let auth = self.authenticate(&scraper).await?;

        info!("=== Step 2: Searching for {:?} ===", query);
        let products = search_category(&scraper, query).await;
        let products_found = products.len();
        if products.is_empty() {
            warn!("No products found for {:?}", query);
        }

        info!("=== Step 3: Checking inventory ({} products) ===", products_found);
        let collected = collect_inventory(&scraper, products).await;

        let report = RunReport {
            auth,
            products_found,
            skipped: collected.skipped,
            records: collected.records,
        };
        info!(
            "=== Done: {} products | {} with inventory | {} skipped ===",
            report.products_found,
            report.records.len(),
            report.skipped
        );
        Ok(report)
    }

    /// Login + search only.
    pub async fn search(&self, query: &str) -> Result<Vec<ProductRecord>> {
        let scraper = self.scraper()?;
        self.authenticate(&scraper).await?;
        Ok(search_category(&scraper, query).await)
    }

    async fn authenticate(&self, scraper: &SanmarScraper) -> Result<AuthStatus> {
        let auth = &self.config.auth;
        let status = match (auth.username.as_deref(), auth.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() => scraper.login(user, pass).await,
            _ => AuthStatus::Unconfirmed {
                reason: "no credentials configured".to_string(),
            },
        };
        check_auth_policy(&status, auth.proceed_unconfirmed)?;
        Ok(status)
    }
}

/// Decide whether a run may continue after login.
pub fn check_auth_policy(status: &AuthStatus, proceed_unconfirmed: bool) -> Result<()> {
    match status {
        AuthStatus::Confirmed => Ok(()),
        AuthStatus::Unconfirmed { reason } if proceed_unconfirmed => {
            warn!(
                "Login unconfirmed ({}); continuing because auth.proceed_unconfirmed = true",
                reason
            );
            Ok(())
        }
        AuthStatus::Unconfirmed { reason } => bail!(
            "Login unconfirmed: {} (set auth.proceed_unconfirmed = true to continue anyway)",
            reason
        ),
    }
}

#[derive(Debug, Default)]
pub struct Collected {
    pub records: Vec<InventoryRecord>,
    pub skipped: usize,
}

/// Sequential, in-order inventory fetch. Each record is merged with the
/// listing it was fetched for.
pub async fn collect_inventory<S>(source: &S, products: Vec<ProductRecord>) -> Collected
where
    S: InventorySource + ?Sized,
{
    let total = products.len();
    let mut out = Collected::default();

    for (i, product) in products.into_iter().enumerate() {
        if i > 0 {
            source.pace().await;
        }
        info!("[{}/{}] Checking inventory for: {}", i + 1, total, product.name);

        let response = source.fetch_inventory(&product.code).await;
        match inventory_from_response(&product.code, response) {
            Some(record) => out.records.push(record.with_listing(product)),
            None => out.skipped += 1,
        }
    }

    out
}

// ── Reporting ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct RunReport {
    pub auth: AuthStatus,
    pub products_found: usize,
    pub skipped: usize,
    pub records: Vec<InventoryRecord>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_records(&self.records)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub total_products: usize,
    pub total_variants: usize,
    pub total_stock: u64,
    pub in_stock_products: usize,
}

impl RunSummary {
    pub fn from_records(records: &[InventoryRecord]) -> Self {
        Self {
            total_products: records.len(),
            total_variants: records.iter().map(|r| r.variants().len()).sum(),
            total_stock: records
                .iter()
                .fold(0u64, |acc, r| acc.saturating_add(r.total_stock())),
            in_stock_products: records.iter().filter(|r| r.total_stock() > 0).count(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

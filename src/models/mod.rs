use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Product listing ───────────────────────────────────────────────────────────

/// One product found by a search. `code` is the vendor SKU and unique within a result set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductRecord {
    pub code: String,
    pub name: String,
    pub url: String, // relative, e.g. "/p/PC54"
}

impl ProductRecord {
    pub fn new(code: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            url: url.into(),
        }
    }
}

// ── Inventory ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariantRecord {
    pub variant_code: String,
    pub size: String,
    pub color: String,
    pub stock_level: u64,
    pub stock_by_location: BTreeMap<String, i64>,
    pub available_stock: BTreeMap<String, i64>,
}

/// Stock for one product. `total_stock` is derived from the variants at
/// construction and cannot be set on its own.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InventoryRecord {
    pub product_code: String,
    pub product_name: String,
    pub base_product: String,
    listing: Option<ProductRecord>,
    variants: Vec<VariantRecord>,
    total_stock: u64,
}

impl InventoryRecord {
    pub fn new(
        product_code: impl Into<String>,
        product_name: impl Into<String>,
        base_product: impl Into<String>,
        variants: Vec<VariantRecord>,
    ) -> Self {
        let total_stock = sum_stock(&variants);
        Self {
            product_code: product_code.into(),
            product_name: product_name.into(),
            base_product: base_product.into(),
            listing: None,
            variants,
            total_stock,
        }
    }

    /// Attach the search listing this inventory was fetched for.
    pub fn with_listing(mut self, listing: ProductRecord) -> Self {
        self.listing = Some(listing);
        self
    }

    pub fn variants(&self) -> &[VariantRecord] {
        &self.variants
    }

    pub fn total_stock(&self) -> u64 {
        self.total_stock
    }

    /// Listing name when merged and non-empty, else the name from the inventory payload.
    pub fn display_name(&self) -> &str {
        match &self.listing {
            Some(l) if !l.name.is_empty() => &l.name,
            _ => &self.product_name,
        }
    }

    pub fn url(&self) -> &str {
        self.listing.as_ref().map(|l| l.url.as_str()).unwrap_or("")
    }
}

/// Saturates at `u64::MAX` instead of overflowing.
pub fn sum_stock(variants: &[VariantRecord]) -> u64 {
    variants.iter().fold(0u64, |acc, v| acc.saturating_add(v.stock_level))
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Outcome of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    Confirmed,
    Unconfirmed { reason: String },
}

impl AuthStatus {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, AuthStatus::Confirmed)
    }
}

/// A response body as handed over by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub final_url: String,
    pub body: String,
}

impl RawResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn ensure_ok(self) -> Result<Self, FetchError> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                status: self.status,
                url: self.final_url,
            })
        }
    }
}

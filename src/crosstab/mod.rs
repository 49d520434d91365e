//! Pivot tables over the flattened variant list.
//!
//! Columns are discovered from the data. Row keys and value columns are kept
//! in lexicographic order, so the same input always produces the same table,
//! and every row carries a cell (possibly 0) for every column.

use crate::models::InventoryRecord;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const PRODUCT_CODE: &str = "Product Code";
pub const PRODUCT_NAME: &str = "Product Name";
pub const BASE_PRODUCT: &str = "Base Product";
pub const URL: &str = "URL";
pub const PRODUCT_COLOR: &str = "Product_Color";
pub const COLOR: &str = "Color";
pub const TOTAL_STOCK: &str = "Total Stock";

// ── Flat variant rows ─────────────────────────────────────────────────────────

/// One variant of one product, with the product identity repeated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantRow {
    #[serde(rename = "Product Code")]
    pub product_code: String,
    #[serde(rename = "Product Name")]
    pub product_name: String,
    #[serde(rename = "Base Product")]
    pub base_product: String,
    #[serde(rename = "Variant Code")]
    pub variant_code: String,
    #[serde(rename = "Size")]
    pub size: String,
    #[serde(rename = "Color")]
    pub color: String,
    #[serde(rename = "Stock Level")]
    pub stock_level: u64,
    #[serde(rename = "URL")]
    pub url: String,
}

pub fn flatten(records: &[InventoryRecord]) -> Vec<VariantRow> {
    records
        .iter()
        .flat_map(|rec| {
            rec.variants().iter().map(move |v| VariantRow {
                product_code: rec.product_code.clone(),
                product_name: rec.display_name().to_string(),
                base_product: rec.base_product.clone(),
                variant_code: v.variant_code.clone(),
                size: v.size.clone(),
                color: v.color.clone(),
                stock_level: v.stock_level,
                url: rec.url().to_string(),
            })
        })
        .collect()
}

// ── Matrix ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRow {
    pub key: Vec<String>,
    /// Aligned with `Matrix::value_columns`.
    pub cells: Vec<u64>,
}

impl MatrixRow {
    pub fn total(&self) -> u64 {
        self.cells.iter().fold(0u64, |acc, &n| acc.saturating_add(n))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    pub key_columns: Vec<String>,
    pub value_columns: Vec<String>,
    /// Header of an appended row-sum column, if any.
    pub total_column: Option<String>,
    pub rows: Vec<MatrixRow>,
}

impl Matrix {
    pub fn headers(&self) -> Vec<String> {
        self.key_columns
            .iter()
            .chain(&self.value_columns)
            .chain(&self.total_column)
            .cloned()
            .collect()
    }

    /// Cells of one row in header order, as they go out to CSV.
    pub fn record(&self, row: &MatrixRow) -> Vec<String> {
        let mut out: Vec<String> = row.key.clone();
        out.extend(row.cells.iter().map(u64::to_string));
        if self.total_column.is_some() {
            out.push(row.total().to_string());
        }
        out
    }
}

fn pivot<K, L>(rows: &[VariantRow], key_columns: &[&str], key_of: K, label_of: L) -> Matrix
where
    K: Fn(&VariantRow) -> Vec<String>,
    L: Fn(&VariantRow) -> String,
{
    let mut labels = BTreeSet::new();
    let mut sums: BTreeMap<Vec<String>, BTreeMap<String, u64>> = BTreeMap::new();

    for row in rows {
        let label = label_of(row);
        let cell = sums
            .entry(key_of(row))
            .or_default()
            .entry(label.clone())
            .or_default();
        *cell = cell.saturating_add(row.stock_level);
        labels.insert(label);
    }

    let value_columns: Vec<String> = labels.into_iter().collect();
    let rows = sums
        .into_iter()
        .map(|(key, by_label)| MatrixRow {
            cells: value_columns
                .iter()
                .map(|c| by_label.get(c).copied().unwrap_or(0))
                .collect(),
            key,
        })
        .collect();

    Matrix {
        key_columns: key_columns.iter().map(|c| c.to_string()).collect(),
        value_columns,
        total_column: None,
        rows,
    }
}

fn product_identity(r: &VariantRow) -> Vec<String> {
    vec![
        r.product_code.clone(),
        r.product_name.clone(),
        r.base_product.clone(),
        r.url.clone(),
    ]
}

const IDENTITY_COLUMNS: [&str; 4] = [PRODUCT_CODE, PRODUCT_NAME, BASE_PRODUCT, URL];

// ── Views ─────────────────────────────────────────────────────────────────────

/// Product rows × `"{size} - {color}"` columns.
pub fn size_color_matrix(rows: &[VariantRow]) -> Matrix {
    pivot(rows, &IDENTITY_COLUMNS, product_identity, |r| {
        format!("{} - {}", r.size, r.color)
    })
}

/// (product, color) rows × size columns.
pub fn product_size_matrix(rows: &[VariantRow]) -> Matrix {
    pivot(
        rows,
        &[PRODUCT_COLOR, PRODUCT_CODE, PRODUCT_NAME, COLOR],
        |r| {
            vec![
                format!("{} - {}", r.product_code, r.color),
                r.product_code.clone(),
                r.product_name.clone(),
                r.color.clone(),
            ]
        },
        |r| r.size.clone(),
    )
}

/// Product rows × `"{size} ({color})"` columns, plus a `Total Stock` column.
pub fn complete_matrix(rows: &[VariantRow]) -> Matrix {
    let mut m = pivot(rows, &IDENTITY_COLUMNS, product_identity, |r| {
        format!("{} ({})", r.size, r.color)
    });
    m.total_column = Some(TOTAL_STOCK.to_string());
    m
}

/// The three export views of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crosstabs {
    pub size_color: Matrix,
    pub product_size: Matrix,
    pub complete: Matrix,
}

pub fn build_all(records: &[InventoryRecord]) -> Crosstabs {
    let rows = flatten(records);
    Crosstabs {
        size_color: size_color_matrix(&rows),
        product_size: product_size_matrix(&rows),
        complete: complete_matrix(&rows),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! `checkInventoryJson` payload → [`InventoryRecord`].
//!
//! The raw types below accept whatever subset of the payload is present;
//! defaults are applied here so nothing downstream sees optional vendor fields.

use crate::error::{FetchError, ParseError};
use crate::models::{InventoryRecord, RawResponse, VariantRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

const UNKNOWN_PRODUCT_NAME: &str = "Unknown";

// ── Raw payload ───────────────────────────────────────────────────────────────
//
// Every field goes through a tolerant reader: a null, a value of the wrong
// JSON type or an unusable list entry becomes the field's default instead of
// failing the whole payload.

/// Strings, numbers and booleans as text; anything else is `None`.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Integer, float (truncated) or numeric string.
fn quantity_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(text_of(&Value::deserialize(d)?))
}

fn lenient_quantity<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(quantity_of(&Value::deserialize(d)?))
}

/// Object of quantities; entries whose value is not a quantity are dropped.
fn lenient_quantity_map<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, i64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| quantity_of(v).map(|n| (k.clone(), n)))
            .collect(),
        _ => BTreeMap::new(),
    })
}

/// Array whose entries are decoded one by one; entries that don't fit are skipped.
fn lenient_seq<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Nested object; a value of any other shape counts as absent.
fn lenient_object<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(serde_json::from_value(Value::deserialize(d)?).ok())
}

#[derive(Debug, Default, Deserialize)]
pub struct RawInventoryPayload {
    #[serde(default)]
    pub product: Option<RawProduct>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProduct {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub base_product: Option<String>,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub variant_options: Vec<RawVariantOption>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVariantOption {
    #[serde(default, deserialize_with = "lenient_text")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub stock: Option<RawStock>,
    #[serde(default, deserialize_with = "lenient_quantity_map")]
    pub stock_levels_map: BTreeMap<String, i64>,
    #[serde(default, deserialize_with = "lenient_quantity_map")]
    pub available_stock_map: BTreeMap<String, i64>,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub variant_option_qualifiers: Vec<RawQualifier>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStock {
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub stock_level: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawQualifier {
    #[serde(default, deserialize_with = "lenient_text")]
    pub qualifier: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub value: Option<String>,
}

// ── Normalization ─────────────────────────────────────────────────────────────

pub fn normalize_inventory(product_code: &str, payload: &RawInventoryPayload) -> InventoryRecord {
    let product = payload.product.as_ref();

    let name = product
        .and_then(|p| p.name.clone())
        .unwrap_or_else(|| UNKNOWN_PRODUCT_NAME.to_string());
    let base_product = product.and_then(|p| p.base_product.clone()).unwrap_or_default();

    let variants: Vec<VariantRecord> = product
        .map(|p| p.variant_options.iter().map(normalize_variant).collect())
        .unwrap_or_default();

    InventoryRecord::new(product_code, name, base_product, variants)
}

fn normalize_variant(raw: &RawVariantOption) -> VariantRecord {
    let mut variant = VariantRecord {
        variant_code: raw.code.clone().unwrap_or_default(),
        stock_level: raw
            .stock
            .as_ref()
            .and_then(|s| s.stock_level)
            .map(|n| n.max(0) as u64)
            .unwrap_or(0),
        stock_by_location: raw.stock_levels_map.clone(),
        available_stock: raw.available_stock_map.clone(),
        ..Default::default()
    };

    // No short-circuit: a later qualifier with the same tag overwrites.
    for q in &raw.variant_option_qualifiers {
        let value = q.value.clone().unwrap_or_default();
        match q.qualifier.as_deref() {
            Some("size") => variant.size = value,
            Some("color") | Some("colourCategoryCode") => variant.color = value,
            _ => {}
        }
    }

    variant
}

pub fn parse_inventory(product_code: &str, body: &str) -> Result<InventoryRecord, ParseError> {
    let payload: RawInventoryPayload = serde_json::from_str(body)?;
    Ok(normalize_inventory(product_code, &payload))
}

/// Degrade any transport, status or decode failure to `None` (skip the product).
pub fn inventory_from_response(
    product_code: &str,
    response: Result<RawResponse, FetchError>,
) -> Option<InventoryRecord> {
    let response = match response {
        Ok(r) => r,
        Err(e) => {
            warn!("Inventory check error for {}: {}", product_code, e);
            return None;
        }
    };

    match response.status {
        200 => {}
        401 => {
            warn!("Authorization required for inventory check on {}", product_code);
            return None;
        }
        403 => {
            warn!("Access forbidden for inventory check on {}", product_code);
            return None;
        }
        other => {
            warn!("Inventory check failed for {}: HTTP {}", product_code, other);
            return None;
        }
    }

    match parse_inventory(product_code, &response.body) {
        Ok(record) => {
            debug!(
                "{}: {} variants, {} in stock",
                product_code,
                record.variants().len(),
                record.total_stock()
            );
            Some(record)
        }
        Err(e) => {
            warn!("Failed to parse inventory JSON for {}: {}", product_code, e);
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

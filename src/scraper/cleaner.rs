use crate::models::ProductRecord;
use serde_json::Value;
use std::collections::HashSet;

pub const PRODUCT_PATH_MARKER: &str = "/p/";

// ── Codes & URLs ──────────────────────────────────────────────────────────────

/// Product code from a product URL: the segment right after the last `/p/`,
/// without query string, fragment or sub-path.
/// "/p/PC54/colors?x=1" → "PC54" | "/search?q=tee" → None
pub fn code_from_url(url: &str) -> Option<String> {
    let (_, tail) = url.rsplit_once(PRODUCT_PATH_MARKER)?;
    let code = tail
        .split(['?', '#'])
        .next()
        .and_then(|s| s.split('/').next())
        .unwrap_or("")
        .trim();

    if code.is_empty() { None } else { Some(code.to_string()) }
}

pub fn product_path(code: &str) -> String {
    format!("{PRODUCT_PATH_MARKER}{code}")
}

// ── Text ──────────────────────────────────────────────────────────────────────

/// Concatenate text fragments, each trimmed. "  Port \n" + " Tee" → "PortTee"
pub fn join_trimmed<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts.into_iter().map(str::trim).collect()
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Read a scalar JSON value as text. Numbers are stringified, null/empty → None.
pub fn value_text(v: Option<&Value>) -> Option<String> {
    let s = match v? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if s.is_empty() { None } else { Some(s) }
}

// ── Records ───────────────────────────────────────────────────────────────────

/// Drop records whose code was already seen. First occurrence wins, order kept.
pub fn dedup_by_code(records: Vec<ProductRecord>) -> Vec<ProductRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.code.clone()))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

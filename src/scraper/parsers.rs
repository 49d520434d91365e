use crate::error::ParseError;
use crate::models::ProductRecord;
use crate::scraper::cleaner::{
    code_from_url, dedup_by_code, join_trimmed, product_path, truncate_chars, value_text,
    PRODUCT_PATH_MARKER,
};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, trace};

/// Product container markup seen on search result pages, most specific first.
const CONTAINER_SELECTORS: [&str; 6] = [
    ".product-item",
    ".product-tile",
    ".product-card",
    "[data-product-code]",
    r#"article[itemtype*="Product"]"#,
    ".item-product",
];

/// Title-like elements inside a container, tried in order.
const NAME_SELECTORS: [&str; 7] = [
    ".product-name",
    ".product-title",
    ".title",
    "[data-product-name]",
    "h2",
    "h3",
    "h4",
];

const PRODUCT_ANCHOR: &str = r#"a[href*="/p/"]"#;

/// Names this short are page furniture ("1", "»"), not product titles.
const MIN_NAME_CHARS: usize = 3;
const ANCESTOR_NAME_MAX_CHARS: usize = 100;

fn selector(s: &str) -> Result<Selector, ParseError> {
    Selector::parse(s).map_err(|e| ParseError::Selector {
        selector: s.to_string(),
        reason: format!("{e:?}"),
    })
}

fn element_text(el: ElementRef<'_>) -> String {
    join_trimmed(el.text())
}

fn long_enough(name: &str) -> bool {
    name.chars().count() >= MIN_NAME_CHARS
}

// ── JSON search API ───────────────────────────────────────────────────────────

pub fn parse_json_results(body: &str) -> Result<Vec<ProductRecord>, ParseError> {
    let data: Value = serde_json::from_str(body)?;
    products_from_json(&data)
}

/// Items live under `results` (preferred) or `products`.
pub fn products_from_json(data: &Value) -> Result<Vec<ProductRecord>, ParseError> {
    let obj = data
        .as_object()
        .ok_or_else(|| ParseError::Shape("search response is not a JSON object".into()))?;

    let items = ["results", "products"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_array))
        .ok_or_else(|| ParseError::Shape("no `results` or `products` array".into()))?;

    let mut products = Vec::with_capacity(items.len());
    for item in items {
        match product_from_json_item(item) {
            Some(p) => products.push(p),
            None => trace!("Skipping search item without code/name: {}", item),
        }
    }

    Ok(dedup_by_code(products))
}

fn product_from_json_item(item: &Value) -> Option<ProductRecord> {
    let declared_code = value_text(item.get("code"));
    let url = value_text(item.get("url")).or_else(|| value_text(item.get("pdpUrl")));

    let code = declared_code.or_else(|| url.as_deref().and_then(code_from_url))?;
    let name = value_text(item.get("name"))?;
    let url = url.unwrap_or_else(|| product_path(&code));

    Some(ProductRecord { code, name, url })
}

// ── HTML search page: structural ──────────────────────────────────────────────

/// Container-based extraction, falling back to a scan of every product anchor
/// when no container selector matches.
pub fn extract_structured(html: &str) -> Result<Vec<ProductRecord>, ParseError> {
    let doc = Html::parse_document(html);
    let anchor_sel = selector(PRODUCT_ANCHOR)?;

    for sel_str in CONTAINER_SELECTORS {
        let sel = selector(sel_str)?;
        let containers: Vec<ElementRef<'_>> = doc.select(&sel).collect();
        if containers.is_empty() {
            continue;
        }

        debug!("{} product containers matched {:?}", containers.len(), sel_str);
        let products = products_from_containers(&containers, &anchor_sel)?;
        return Ok(dedup_by_code(products));
    }

    debug!("No product containers; scanning anchors");
    Ok(dedup_by_code(products_from_anchors(&doc, &anchor_sel)))
}

fn products_from_containers(
    containers: &[ElementRef<'_>],
    anchor_sel: &Selector,
) -> Result<Vec<ProductRecord>, ParseError> {
    let name_sels = NAME_SELECTORS
        .iter()
        .map(|s| selector(s))
        .collect::<Result<Vec<_>, _>>()?;

    let mut products = Vec::new();
    for container in containers {
        let Some(link) = container.select(anchor_sel).next() else { continue };
        let href = link.value().attr("href").unwrap_or_default();

        // The first title-like element decides, even when its text is empty.
        let mut name = name_sels
            .iter()
            .find_map(|sel| container.select(sel).next())
            .map(element_text)
            .unwrap_or_default();
        if name.is_empty() {
            name = element_text(link);
        }

        let code = container
            .value()
            .attr("data-product-code")
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .or_else(|| code_from_url(href));

        if let Some(code) = code {
            if long_enough(&name) {
                products.push(ProductRecord::new(code, name, href));
            }
        }
    }
    Ok(products)
}

fn products_from_anchors(doc: &Html, anchor_sel: &Selector) -> Vec<ProductRecord> {
    let mut products = Vec::new();

    for link in doc.select(anchor_sel) {
        let href = link.value().attr("href").unwrap_or_default();
        let Some(code) = code_from_url(href) else { continue };

        let mut name = element_text(link);
        if name.is_empty() {
            name = link.value().attr("title").unwrap_or_default().trim().to_string();
        }
        if !long_enough(&name) {
            if let Some(parent) = link.parent().and_then(ElementRef::wrap) {
                name = truncate_chars(&element_text(parent), ANCESTOR_NAME_MAX_CHARS);
            }
        }

        if long_enough(&name) {
            products.push(ProductRecord::new(code, name, href));
        }
    }
    products
}

// ── HTML search page: raw patterns ────────────────────────────────────────────

/// Regex extraction over the raw text. Patterns run in priority order and the
/// first one with any match is used exclusively.
pub fn extract_by_pattern(html: &str) -> Result<Vec<ProductRecord>, ParseError> {
    let anchor_with_text = Regex::new(r#"(?is)href="(/p/[^"]+)"[^>]*>([^<]+)</a>"#)?;
    let loose_anchor = Regex::new(r#"(?is)<a[^>]+href="(/p/[^"]+)"[^>]*>.*?<.*?>([^<]+)</.*?>"#)?;
    let bare_segment = Regex::new(r#"(?i)/p/([^/"'>\s]+)"#)?;

    for (label, re) in [("anchor-with-text", &anchor_with_text), ("loose-anchor", &loose_anchor)] {
        let products: Vec<ProductRecord> = re
            .captures_iter(html)
            .filter_map(|caps| {
                let href = caps.get(1)?.as_str();
                let name = caps.get(2)?.as_str().trim();
                let code = code_from_url(href)?;
                if name.is_empty() {
                    return None;
                }
                Some(ProductRecord::new(code, name, href))
            })
            .collect();

        if !products.is_empty() {
            debug!("Pattern {} matched {} links", label, products.len());
            return Ok(dedup_by_code(products));
        }
    }

    let products: Vec<ProductRecord> = bare_segment
        .captures_iter(html)
        .filter_map(|caps| {
            let segment = caps.get(1)?.as_str();
            let code = code_from_url(&format!("{PRODUCT_PATH_MARKER}{segment}"))?;
            Some(ProductRecord::new(
                code.clone(),
                format!("Product {code}"),
                product_path(&code),
            ))
        })
        .collect();

    Ok(dedup_by_code(products))
}

// ── Login page ────────────────────────────────────────────────────────────────

pub fn extract_csrf_token(html: &str) -> Option<String> {
    csrf_from_markup(html).or_else(|| csrf_from_text(html))
}

fn csrf_from_markup(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let candidates = [
        (r#"input[name="CSRFToken"]"#, "value"),
        (r#"input[name="_csrf"]"#, "value"),
        (r#"meta[name="csrf-token"]"#, "content"),
    ];

    candidates.iter().find_map(|(sel_str, attr)| {
        let sel = selector(sel_str).ok()?;
        let el = doc.select(&sel).next()?;
        el.value()
            .attr(attr)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    })
}

fn csrf_from_text(html: &str) -> Option<String> {
    let patterns = [
        r#"(?i)name="CSRFToken"\s+value="([^"]+)""#,
        r#"(?i)name="_csrf"\s+value="([^"]+)""#,
        r#"(?i)csrf_token["']?\s*:\s*["']([^"']+)["']"#,
        r#"(?i)<meta\s+name="csrf-token"\s+content="([^"]+)""#,
    ];

    patterns.iter().find_map(|p| {
        let re = Regex::new(p).ok()?;
        re.captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Heuristic: account markers in the body and not bounced back to `/login`.
pub fn looks_logged_in(body: &str, final_url: &str) -> bool {
    let lower = body.to_lowercase();
    let has_marker = ["logout", "my account", "welcome"]
        .iter()
        .any(|m| lower.contains(m));
    has_marker && !final_url.contains("/login")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

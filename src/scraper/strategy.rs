//! Ordered extraction strategies for search responses.
//!
//! Each strategy either produces a non-empty product list or declines. A
//! [`FallbackChain`] asks them in order and returns the first list it gets;
//! results from different strategies are never merged.

use crate::error::ParseError;
use crate::models::ProductRecord;
use crate::scraper::parsers::{extract_by_pattern, extract_structured, parse_json_results};
use tracing::{debug, warn};

pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` when the strategy failed or found nothing.
    fn attempt(&self, body: &str) -> Option<Vec<ProductRecord>>;
}

/// Shared handling of a parser result: errors are logged, empty lists decline.
fn accept(strategy: &'static str, result: Result<Vec<ProductRecord>, ParseError>) -> Option<Vec<ProductRecord>> {
    match result {
        Ok(products) if products.is_empty() => {
            debug!("{}: no products", strategy);
            None
        }
        Ok(products) => Some(products),
        Err(e) => {
            warn!("{}: {}", strategy, e);
            None
        }
    }
}

// ── Strategies ────────────────────────────────────────────────────────────────

/// `findProducts.json` search API body.
pub struct JsonApiStrategy;

impl ExtractionStrategy for JsonApiStrategy {
    fn name(&self) -> &'static str {
        "json-api"
    }

    fn attempt(&self, body: &str) -> Option<Vec<ProductRecord>> {
        accept(self.name(), parse_json_results(body))
    }
}

/// Product containers / product anchors in a search results page.
pub struct HtmlSelectorStrategy;

impl ExtractionStrategy for HtmlSelectorStrategy {
    fn name(&self) -> &'static str {
        "html-selectors"
    }

    fn attempt(&self, body: &str) -> Option<Vec<ProductRecord>> {
        accept(self.name(), extract_structured(body))
    }
}

/// Regex scan of the raw page text.
pub struct HtmlPatternStrategy;

impl ExtractionStrategy for HtmlPatternStrategy {
    fn name(&self) -> &'static str {
        "html-patterns"
    }

    fn attempt(&self, body: &str) -> Option<Vec<ProductRecord>> {
        accept(self.name(), extract_by_pattern(body))
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
pub struct Selection {
    pub strategy: &'static str,
    pub products: Vec<ProductRecord>,
}

pub struct FallbackChain {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl FallbackChain {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn json() -> Self {
        Self::new(vec![Box::new(JsonApiStrategy)])
    }

    pub fn html() -> Self {
        Self::new(vec![Box::new(HtmlSelectorStrategy), Box::new(HtmlPatternStrategy)])
    }

    pub fn select(&self, body: &str) -> Option<Selection> {
        self.strategies.iter().find_map(|s| {
            s.attempt(body).map(|products| {
                debug!("{} produced {} products", s.name(), products.len());
                Selection {
                    strategy: s.name(),
                    products,
                }
            })
        })
    }

    /// Products from the first strategy that produced any, or an empty list.
    pub fn products(&self, body: &str) -> Vec<ProductRecord> {
        self.select(body).map(|s| s.products).unwrap_or_default()
    }
}

/// HTML path of the result parser.
pub fn parse_html_results(html: &str) -> Vec<ProductRecord> {
    FallbackChain::html().products(html)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed {
        name: &'static str,
        out: Option<Vec<ProductRecord>>,
        calls: Arc<AtomicUsize>,
    }

    impl ExtractionStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }
        fn attempt(&self, _body: &str) -> Option<Vec<ProductRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.out.clone()
        }
    }

    fn fixed(name: &'static str, out: Option<Vec<ProductRecord>>) -> (Box<dyn ExtractionStrategy>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Box::new(Fixed { name, out, calls: Arc::clone(&calls) }), calls)
    }

    #[test]
    fn first_successful_strategy_wins_and_later_ones_are_skipped() {
        let (a, a_calls) = fixed("a", None);
        let (b, b_calls) = fixed("b", Some(vec![ProductRecord::new("B1", "Bee", "/p/B1")]));
        let (c, c_calls) = fixed("c", Some(vec![ProductRecord::new("C1", "Sea", "/p/C1")]));

        let selection = FallbackChain::new(vec![a, b, c]).select("body").unwrap();
        assert_eq!(selection.strategy, "b");
        assert_eq!(selection.products[0].code, "B1");
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn all_declining_gives_none() {
        let (a, _) = fixed("a", None);
        let chain = FallbackChain::new(vec![a]);
        assert_eq!(chain.select("x"), None);
        assert!(chain.products("x").is_empty());
    }

    #[test]
    fn empty_json_results_decline() {
        assert_eq!(JsonApiStrategy.attempt(r#"{"results":[]}"#), None);
        assert_eq!(JsonApiStrategy.attempt("not json"), None);
    }

    #[test]
    fn html_chain_prefers_selectors() {
        let html = r#"<div class="product-item"><a href="/p/PC54">Core Cotton Tee</a></div>"#;
        let selection = FallbackChain::html().select(html).unwrap();
        assert_eq!(selection.strategy, "html-selectors");
        assert_eq!(selection.products, vec![ProductRecord::new("PC54", "Core Cotton Tee", "/p/PC54")]);
    }

    #[test]
    fn html_chain_falls_back_to_patterns() {
        // Only reachable by the bare-segment pattern: the link lives in a script.
        let html = r#"<script>location.href = "/p/ST350";</script>"#;
        let selection = FallbackChain::html().select(html).unwrap();
        assert_eq!(selection.strategy, "html-patterns");
        assert_eq!(selection.products, vec![ProductRecord::new("ST350", "Product ST350", "/p/ST350")]);
    }

    #[test]
    fn html_example_two_anchors_one_record() {
        let html = r#"<a href="/p/ABC123">Fleece Hoodie</a> <a href="/p/ABC123">Fleece Hoodie</a>"#;
        let products = parse_html_results(html);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].code, "ABC123");
    }
}

pub mod cleaner;
pub mod http_client;
pub mod inventory;
pub mod parsers;
pub mod strategy;

use crate::config::VendorConfig;
use crate::error::FetchError;
use crate::models::{AuthStatus, ProductRecord, RawResponse};
use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info, warn};

use self::http_client::HttpClient;
use self::parsers::{extract_csrf_token, looks_logged_in};
use self::strategy::{parse_html_results, FallbackChain};

// ── Collaborator traits ───────────────────────────────────────────────────────

/// Where search response bodies come from.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// `findProducts.json` search API.
    async fn search_json(&self, query: &str) -> Result<RawResponse, FetchError>;
    /// Plain HTML search results page.
    async fn search_html(&self, query: &str) -> Result<RawResponse, FetchError>;
}

/// Where per-product inventory payloads come from.
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn fetch_inventory(&self, product_code: &str) -> Result<RawResponse, FetchError>;

    /// Called between consecutive inventory requests.
    async fn pace(&self) {}
}

// ── Category search ───────────────────────────────────────────────────────────

/// JSON API first; the HTML search page only if that produced nothing.
/// Results are never combined across the two.
pub async fn search_category<B>(backend: &B, query: &str) -> Vec<ProductRecord>
where
    B: SearchBackend + ?Sized,
{
    match backend.search_json(query).await {
        Ok(resp) if resp.is_ok() => {
            if let Some(selection) = FallbackChain::json().select(&resp.body) {
                info!(
                    "Found {} products for {:?} via {}",
                    selection.products.len(),
                    query,
                    selection.strategy
                );
                return selection.products;
            }
            info!("Search API returned no products for {:?}, trying HTML search", query);
        }
        Ok(resp) => warn!("Search API returned HTTP {}, trying HTML search", resp.status),
        Err(e) => warn!("Search API failed ({}), trying HTML search", e),
    }

    match backend.search_html(query).await {
        Ok(resp) if resp.is_ok() => {
            let products = parse_html_results(&resp.body);
            info!("Found {} products for {:?} via HTML search", products.len(), query);
            products
        }
        Ok(resp) => {
            error!("Search failed: HTTP {}", resp.status);
            Vec::new()
        }
        Err(e) => {
            error!("Search error: {}", e);
            Vec::new()
        }
    }
}

// ── SanMar scraper ────────────────────────────────────────────────────────────

pub struct SanmarScraper {
    client: HttpClient,
    page_size: u32,
    sort: String,
}

impl SanmarScraper {
    pub fn new(config: &VendorConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: HttpClient::new(config)?,
            page_size: config.page_size,
            sort: config.sort.clone(),
        })
    }

    fn xhr_headers(&self, referer: String) -> Vec<(&'static str, String)> {
        vec![
            ("Accept", "application/json, text/plain, */*".to_string()),
            ("X-Requested-With", "XMLHttpRequest".to_string()),
            ("Origin", self.client.base_url().to_string()),
            ("Referer", referer),
        ]
    }

    fn search_page_url(&self, query: &str) -> Result<url::Url, FetchError> {
        let base = self.client.url("/search");
        let page_size = self.page_size.to_string();
        url::Url::parse_with_params(&base, &[("text", query), ("pageSize", page_size.as_str())])
            .map_err(|source| FetchError::InvalidUrl { url: base, source })
    }

    /// Log in through the Spring Security form. Never fails: anything short of
    /// a recognisable logged-in page is reported as `Unconfirmed`.
    pub async fn login(&self, username: &str, password: &str) -> AuthStatus {
        match self.try_login(username, password).await {
            Ok(status) => status,
            Err(e) => AuthStatus::Unconfirmed {
                reason: format!("login request failed: {e}"),
            },
        }
    }

    async fn try_login(&self, username: &str, password: &str) -> Result<AuthStatus, FetchError> {
        let login_url = self.client.url("/login");
        let page = self.client.get(&login_url, &[]).await?.ensure_ok()?;

        let csrf = extract_csrf_token(&page.body);
        if csrf.is_none() {
            warn!("Could not find CSRF token, attempting login without it");
        }

        let mut form = vec![("j_username", username), ("j_password", password)];
        if let Some(token) = csrf.as_deref() {
            form.push(("CSRFToken", token));
        }

        let headers = [
            ("Referer", login_url.clone()),
            ("Origin", self.client.base_url().to_string()),
            ("Cache-Control", "no-cache".to_string()),
        ];
        let resp = self
            .client
            .post_form(&self.client.url("/j_spring_security_check"), &form, &headers)
            .await?;

        if looks_logged_in(&resp.body, &resp.final_url) {
            info!("Logged in as {}", username);
            Ok(AuthStatus::Confirmed)
        } else {
            Ok(AuthStatus::Unconfirmed {
                reason: format!(
                    "no account markers after login (HTTP {}, landed on {})",
                    resp.status, resp.final_url
                ),
            })
        }
    }
}

#[async_trait]
impl SearchBackend for SanmarScraper {
    async fn search_json(&self, query: &str) -> Result<RawResponse, FetchError> {
        let referer = self.search_page_url(query)?.to_string();
        let body = json!({
            "text": query,
            "currentPage": 0,
            "pageSize": self.page_size,
            "sort": self.sort,
        });
        self.client
            .post_json(
                &self.client.url("/search/findProducts.json"),
                &body,
                &self.xhr_headers(referer),
            )
            .await
    }

    async fn search_html(&self, query: &str) -> Result<RawResponse, FetchError> {
        let url = self.search_page_url(query)?;
        self.client.get(url.as_str(), &[]).await
    }
}

#[async_trait]
impl InventorySource for SanmarScraper {
    async fn fetch_inventory(&self, product_code: &str) -> Result<RawResponse, FetchError> {
        let referer = self.client.url(&cleaner::product_path(product_code));
        let url = format!("{referer}/checkInventoryJson");
        self.client.get(&url, &self.xhr_headers(referer)).await
    }

    async fn pace(&self) {
        self.client.polite_delay().await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::inventory::inventory_from_response;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{
        body_partial_json, body_string_contains, header, header_regex, method, path, query_param,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // Counting in-memory backend

    struct CannedBackend {
        json: Result<RawResponse, u16>,
        html: RawResponse,
        json_calls: AtomicUsize,
        html_calls: AtomicUsize,
    }

    fn ok(body: &str) -> RawResponse {
        RawResponse {
            status: 200,
            final_url: "https://www.sanmar.com/search".into(),
            body: body.into(),
        }
    }

    impl CannedBackend {
        fn new(json: Result<RawResponse, u16>, html: &str) -> Self {
            Self {
                json,
                html: ok(html),
                json_calls: AtomicUsize::new(0),
                html_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SearchBackend for CannedBackend {
        async fn search_json(&self, _query: &str) -> Result<RawResponse, FetchError> {
            self.json_calls.fetch_add(1, Ordering::SeqCst);
            self.json.clone().map_err(|status| FetchError::Status {
                status,
                url: "findProducts.json".into(),
            })
        }

        async fn search_html(&self, _query: &str) -> Result<RawResponse, FetchError> {
            self.html_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.html.clone())
        }
    }

    const HTML_PAGE: &str = r#"<div class="product-card"><a href="/p/K500">Silk Touch Polo</a></div>
        <div class="product-card"><a href="/p/K420">Pique Polo</a></div>"#;

    #[test]
    fn non_empty_json_tier_never_touches_html() {
        let backend = CannedBackend::new(
            Ok(ok(r#"{"results":[{"code":"PC54","name":"Port & Co Tee","url":"/p/PC54"}]}"#)),
            HTML_PAGE,
        );
        let products = tokio_test::block_on(search_category(&backend, "tee"));
        assert_eq!(products, vec![ProductRecord::new("PC54", "Port & Co Tee", "/p/PC54")]);
        assert_eq!(backend.json_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.html_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_json_tier_yields_exactly_the_html_tier() {
        let backend = CannedBackend::new(Ok(ok(r#"{"results":[]}"#)), HTML_PAGE);
        let products = tokio_test::block_on(search_category(&backend, "polo"));
        assert_eq!(products, parse_html_results(HTML_PAGE));
        assert_eq!(products.len(), 2);
        assert_eq!(backend.html_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn json_transport_error_falls_back() {
        let backend = CannedBackend::new(Err(503), HTML_PAGE);
        let products = tokio_test::block_on(search_category(&backend, "polo"));
        assert_eq!(products, parse_html_results(HTML_PAGE));
    }

    #[test]
    fn json_non_200_and_garbage_fall_back() {
        let mut non_200 = ok("{}");
        non_200.status = 401;
        for json in [non_200, ok("<!doctype html><p>please log in</p>")] {
            let backend = CannedBackend::new(Ok(json), HTML_PAGE);
            let products = tokio_test::block_on(search_category(&backend, "polo"));
            assert_eq!(products.len(), 2);
            assert_eq!(backend.html_calls.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn failed_html_tier_is_empty() {
        let mut backend = CannedBackend::new(Ok(ok(r#"{"products":[]}"#)), HTML_PAGE);
        backend.html.status = 500;
        let products = tokio_test::block_on(search_category(&backend, "polo"));
        assert!(products.is_empty());
    }

    // HTTP against a mock server

    fn test_scraper(server: &MockServer) -> SanmarScraper {
        let config = VendorConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            request_delay_ms: 0,
            ..VendorConfig::default()
        };
        SanmarScraper::new(&config).expect("failed to build test scraper")
    }

    #[tokio::test]
    async fn login_posts_credentials_and_csrf() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<form><input type="hidden" name="CSRFToken" value="tok-1"></form>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/j_spring_security_check"))
            .and(body_string_contains("j_username=mike"))
            .and(body_string_contains("j_password=s3cret"))
            .and(body_string_contains("CSRFToken=tok-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"Welcome Mike <a href="/logout">Log out</a>"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let status = test_scraper(&server).login("mike", "s3cret").await;
        assert_eq!(status, AuthStatus::Confirmed);
    }

    #[tokio::test]
    async fn login_without_markers_is_unconfirmed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<form></form>"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/j_spring_security_check"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Invalid username or password"))
            .mount(&server)
            .await;

        let status = test_scraper(&server).login("mike", "wrong").await;
        assert!(matches!(status, AuthStatus::Unconfirmed { .. }));
    }

    #[tokio::test]
    async fn configured_cookie_travels_with_login_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "JSESSIONID=login123; Path=/")
                    .set_body_string(r#"<input type="hidden" name="CSRFToken" value="tok-1">"#),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/j_spring_security_check"))
            .respond_with(ResponseTemplate::new(200).set_body_string("My Account | Logout"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/p/PC54/checkInventoryJson"))
            .and(header_regex("cookie", "JSESSIONID=login123"))
            .and(header_regex("cookie", "extra=1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"product":{"name":"Tee"}}"#))
            .expect(1)
            .mount(&server)
            .await;

        let config = VendorConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            request_delay_ms: 0,
            session_cookie: Some("extra=1".into()),
            ..VendorConfig::default()
        };
        let scraper = SanmarScraper::new(&config).expect("failed to build test scraper");

        assert_eq!(scraper.login("mike", "s3cret").await, AuthStatus::Confirmed);
        let resp = scraper.fetch_inventory("PC54").await.unwrap();
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn unreachable_login_page_is_unconfirmed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        match test_scraper(&server).login("mike", "s3cret").await {
            AuthStatus::Unconfirmed { reason } => assert!(reason.contains("503"), "{reason}"),
            other => panic!("expected Unconfirmed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_uses_api_and_skips_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search/findProducts.json"))
            .and(header("X-Requested-With", "XMLHttpRequest"))
            .and(body_partial_json(serde_json::json!({"text": "polo", "pageSize": 50, "currentPage": 0})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"code": "K500", "name": "Silk Touch Polo", "url": "/p/K500"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(HTML_PAGE))
            .expect(0)
            .mount(&server)
            .await;

        let products = search_category(&test_scraper(&server), "polo").await;
        assert_eq!(products, vec![ProductRecord::new("K500", "Silk Touch Polo", "/p/K500")]);
    }

    #[tokio::test]
    async fn search_falls_back_to_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search/findProducts.json"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("text", "polo shirt"))
            .and(query_param("pageSize", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_string(HTML_PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let products = search_category(&test_scraper(&server), "polo shirt").await;
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].code, "K500");
    }

    #[tokio::test]
    async fn inventory_request_path_and_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/p/PC54/checkInventoryJson"))
            .and(header("X-Requested-With", "XMLHttpRequest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "product": {
                    "name": "Core Cotton Tee",
                    "baseProduct": "PC54",
                    "variantOptions": [
                        {"code": "PC54-S", "stock": {"stockLevel": 7},
                         "variantOptionQualifiers": [{"qualifier": "size", "value": "S"}]}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let scraper = test_scraper(&server);
        let record = inventory_from_response("PC54", scraper.fetch_inventory("PC54").await).unwrap();
        assert_eq!(record.total_stock(), 7);
        assert_eq!(record.variants()[0].variant_code, "PC54-S");

        // Unknown product: wiremock answers 404
        assert!(inventory_from_response("NOPE", scraper.fetch_inventory("NOPE").await).is_none());
    }
}

use crate::config::VendorConfig;
use crate::error::FetchError;
use crate::models::RawResponse;
use reqwest::cookie::Jar;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Extra per-request headers, e.g. `("Referer", url)`.
pub type Headers<'a> = &'a [(&'static str, String)];

/// Add each `name=value` pair of a raw `Cookie` header value to the jar.
fn seed_cookies(jar: &Jar, raw: &str, site: &Url) {
    for pair in raw.split(';').map(str::trim).filter(|p| p.contains('=')) {
        jar.add_cookie_str(&format!("{pair}; Path=/"), site);
    }
}

/// Cookie-keeping session against the vendor site. One attempt per request;
/// non-200 statuses are returned to the caller, not turned into errors.
pub struct HttpClient {
    inner: reqwest::Client,
    base_url: String,
    request_delay: Duration,
}

impl HttpClient {
    pub fn new(config: &VendorConfig) -> Result<Self, FetchError> {
        let mut defaults = HeaderMap::new();
        defaults.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        defaults.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        // Configured cookies and the ones login sets share this jar.
        let jar = Arc::new(Jar::default());
        if let Some(cookie) = config.session_cookie.as_deref() {
            let site = Url::parse(&config.base_url).map_err(|source| FetchError::InvalidUrl {
                url: config.base_url.clone(),
                source,
            })?;
            seed_cookies(&jar, cookie, &site);
        }

        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(defaults)
            .gzip(true)
            .cookie_provider(jar)
            .build()?;

        Ok(Self {
            inner,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_delay: Duration::from_millis(config.request_delay_ms),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a site path ("/login" → "https://www.sanmar.com/login").
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, url: &str, headers: Headers<'_>) -> Result<RawResponse, FetchError> {
        debug!("GET {}", url);
        let mut req = self.inner.get(url);
        for (k, v) in headers {
            req = req.header(*k, v.as_str());
        }
        Self::into_raw(req.send().await?).await
    }

    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        headers: Headers<'_>,
    ) -> Result<RawResponse, FetchError> {
        debug!("POST {} (form)", url);
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form.iter())
            .finish();

        let mut req = self
            .inner
            .post(url)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body);
        for (k, v) in headers {
            req = req.header(*k, v.as_str());
        }
        Self::into_raw(req.send().await?).await
    }

    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        headers: Headers<'_>,
    ) -> Result<RawResponse, FetchError> {
        debug!("POST {} (json)", url);
        let mut req = self.inner.post(url).json(body);
        for (k, v) in headers {
            req = req.header(*k, v.as_str());
        }
        Self::into_raw(req.send().await?).await
    }

    async fn into_raw(resp: reqwest::Response) -> Result<RawResponse, FetchError> {
        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let body = resp.text().await?;
        debug!("HTTP {} from {} ({} bytes)", status, final_url, body.len());
        Ok(RawResponse {
            status,
            final_url,
            body,
        })
    }

    /// Fixed pause between consecutive requests to go easy on the vendor.
    pub async fn polite_delay(&self) {
        if !self.request_delay.is_zero() {
            sleep(self.request_delay).await;
        }
    }
}

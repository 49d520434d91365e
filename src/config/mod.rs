use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub vendor: VendorConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Vendor site / HTTP session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VendorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pause between consecutive inventory requests. 0 disables pacing.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_sort")]
    pub sort: String,

    /// Raw `Cookie` header value sent with every request (e.g. copied from a browser session).
    #[serde(default)]
    pub session_cookie: Option<String>,
}

/// Login credentials and the policy for ambiguous logins
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Keep going when the login response carries no success markers.
    #[serde(default = "default_true")]
    pub proceed_unconfirmed: bool,
}

/// CSV export configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    #[serde(default = "default_true")]
    pub write_detailed: bool,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://www.sanmar.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36".to_string()
}
fn default_page_size() -> u32 {
    50
}
fn default_sort() -> String {
    "relevance".to_string()
}
fn default_out_dir() -> PathBuf {
    PathBuf::from("exports")
}
fn default_true() -> bool {
    true
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            user_agent: default_user_agent(),
            page_size: default_page_size(),
            sort: default_sort(),
            session_cookie: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            proceed_unconfirmed: true,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            write_detailed: true,
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// `config/default.toml`, then `config/local.toml`, then `SANMAR__*` variables.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("SANMAR").separator("__"))
            .build()
            .context("Failed to assemble configuration sources")?;

        cfg.try_deserialize()
            .context("Invalid configuration (check config/*.toml and SANMAR__* variables)")
    }
}

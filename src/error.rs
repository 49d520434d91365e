use thiserror::Error;

/// Transport-level failures. Callers degrade these to an empty result for the item.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("invalid URL \"{url}\": {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Failures while turning a response body into records.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected payload shape: {0}")]
    Shape(String),

    #[error("bad selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },

    #[error("bad pattern: {0}")]
    Pattern(#[from] regex::Error),
}

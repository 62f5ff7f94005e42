//! Scrape error types.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for scrape operations.
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Errors raised while fetching from an upstream or turning its response
/// into exposition text.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid request to {url}: {reason}")]
    InvalidRequest { url: String, reason: String },

    /// Connection, handshake or transfer failure.
    #[error("upstream unavailable at {url}: {reason}")]
    Upstream { url: String, reason: String },

    #[error("upstream {url} answered {status}")]
    Status { url: String, status: u16 },

    #[error("upstream {url} did not answer within {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("cannot decompress response from {url}: {source}")]
    Decompress {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON from {url}: {source}")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot extract metric {metric}: {source}")]
    Extract {
        metric: String,
        #[source]
        source: promgate_extract::ExtractError,
    },

    #[error("exposition error: {0}")]
    Exposition(#[from] promgate_exposition::ExpositionError),

    #[error("metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),
}

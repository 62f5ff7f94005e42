//! Server error types.

use axum::http::StatusCode;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("local exposition answered {0}")]
    LocalStatus(StatusCode),

    #[error("cannot read local exposition: {0}")]
    LocalBody(String),

    #[error("cannot decompress local exposition: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),

    #[error("scraper setup failed: {0}")]
    Scrape(#[from] promgate_scrape::ScrapeError),
}

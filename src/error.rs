//! Error types shared across the scraper.
//!
//! Transport failures and non-2xx responses are kept as separate variants so
//! callers can log them distinctly, but the retry wrapper treats every
//! variant the same way.

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: StatusCode, url: Url },

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no states or union territories discovered at {0}")]
    NoRegions(Url),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

//! Error taxonomy for the crawl engine and its Fetch Port boundary.

use thiserror::Error;

/// Errors raised by the Fetch Port (`crate::fetch`).
///
/// `FetchError` covers everything that can go wrong making an HTTP request:
/// network failures, timeouts, and protocol-level errors. It never
/// represents an HTTP-level non-2xx status — that is a normal `Response`
/// the engine inspects and skips. Response bodies are decoded lossily
/// (invalid UTF-8 becomes replacement characters), so a body never fails to
/// decode.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} timed out")]
    Timeout { url: String },
}

/// Errors surfaced by the crawl engine to its caller.
///
/// `FetchError` and non-200 statuses are recovered locally by the engine
/// (logged at warn level, the URL is skipped) and never reach this type.
/// Only startup validation failures and genuinely unexpected worker errors
/// propagate here.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unexpected crawl failure: {0}")]
    Unexpected(String),
}

pub type Result<T, E = CrawlError> = std::result::Result<T, E>;

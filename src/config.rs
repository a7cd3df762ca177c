//! Environment-driven settings consumed by the Fetch Port and the CLI.
//!
//! Mirrors `original_source/.../http/settings.py`'s `HttpSettings`, a
//! `pydantic_settings.BaseSettings` subclass with env prefix `CRAWLER_`:
//! same field names, same defaults, same `> 0` validation, translated to
//! `serde` + `envy` deserialization with an explicit validation pass (envy
//! has no first-class constrained-numeric type the way `pydantic`'s
//! `Annotated[float, Gt(0)]` does).

use crate::error::CrawlError;
use serde::Deserialize;

fn default_timeout() -> f64 {
    30.0
}

fn default_user_agent() -> String {
    format!("web-crawler/{}", env!("CARGO_PKG_VERSION"))
}

fn default_requests_per_second() -> f64 {
    10.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> f64 {
    0.5
}

/// Settings for the Fetch Port, sourced from environment variables prefixed
/// `CRAWLER_` (e.g. `CRAWLER_TIMEOUT`, `CRAWLER_REQUESTS_PER_SECOND`).
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerSettings {
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: f64,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            requests_per_second: default_requests_per_second(),
            max_retries: default_max_retries(),
            retry_backoff: default_retry_backoff(),
        }
    }
}

impl CrawlerSettings {
    /// Loads settings from `CRAWLER_*` environment variables, falling back
    /// to the defaults above for anything unset.
    pub fn from_env() -> Result<Self, CrawlError> {
        let settings: Self = envy::prefixed("CRAWLER_")
            .from_env()
            .map_err(|e| CrawlError::InvalidArgument(format!("invalid configuration: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), CrawlError> {
        if self.timeout <= 0.0 {
            return Err(CrawlError::InvalidArgument("timeout must be > 0".into()));
        }
        if self.requests_per_second <= 0.0 {
            return Err(CrawlError::InvalidArgument(
                "requests_per_second must be > 0".into(),
            ));
        }
        if self.retry_backoff <= 0.0 {
            return Err(CrawlError::InvalidArgument(
                "retry_backoff must be > 0".into(),
            ));
        }
        Ok(())
    }
}

//! `politecrawl` — a polite, same-host, concurrency-bounded web crawler.
//!
//! Given a seed URL, [`crawl`] fetches the page, extracts outbound links,
//! and recursively follows those that stay on the same host, respecting
//! `robots.txt` and a per-host rate limit. Results stream incrementally and
//! the crawl can be cancelled by dropping the returned [`ResultStream`].

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod ratelimit;
pub mod robots;

pub use engine::{crawl, CrawlOptions, CrawlResult, ResultStream, WorkItem};
pub use error::{CrawlError, FetchError};
pub use fetch::{Fetcher, ReqwestFetcher, Response};
pub use ratelimit::RateLimiter;
pub use robots::RobotsOracle;

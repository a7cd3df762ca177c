//! CLI front-end for `politecrawl`.
//!
//! Thin by design: argument parsing and settings loading live here; the
//! crawl itself is entirely the library's `engine::crawl`. Grounded in the
//! `clap::Parser`-derive CLIs common across the example pack's crawlers.

use clap::Parser;
use politecrawl::{crawl, CrawlError, CrawlOptions, RateLimiter, ReqwestFetcher};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Serialize)]
struct PageLine<'a> {
    url: &'a str,
    links: Vec<&'a str>,
}

/// A polite, same-host web crawler.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Seed URL to start crawling from.
    url: String,

    /// Maximum link-following depth from the seed.
    #[arg(long)]
    max_depth: Option<usize>,

    /// Maximum number of pages to emit.
    #[arg(long)]
    max_pages: Option<usize>,

    /// Maximum number of in-flight fetches.
    #[arg(long, default_value_t = 5)]
    max_concurrency: usize,

    /// User-Agent string sent with every request and matched against robots.txt groups.
    #[arg(long)]
    user_agent: Option<String>,

    /// Disable robots.txt enforcement and per-host rate limiting.
    #[arg(long)]
    no_robots: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    run(args).await
}

async fn run(args: Args) -> ExitCode {
    let settings = match politecrawl::config::CrawlerSettings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("argument error: {err}");
            return ExitCode::from(2);
        }
    };

    let user_agent = args.user_agent.unwrap_or(settings.user_agent);

    let fetcher = match ReqwestFetcher::new(
        &user_agent,
        Duration::from_secs_f64(settings.timeout),
        settings.max_retries,
        Duration::from_secs_f64(settings.retry_backoff),
    ) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(err) => {
            eprintln!("argument error: {err}");
            return ExitCode::from(2);
        }
    };

    let rate_limiter = if args.no_robots {
        None
    } else {
        match RateLimiter::new(settings.requests_per_second) {
            Ok(limiter) => Some(Arc::new(limiter)),
            Err(err) => {
                eprintln!("argument error: {err}");
                return ExitCode::from(2);
            }
        }
    };

    let opts = CrawlOptions {
        max_concurrency: args.max_concurrency,
        user_agent,
        rate_limiter,
        max_depth: args.max_depth,
        max_pages: args.max_pages,
        max_visited: None,
        respect_robots: !args.no_robots,
    };

    let mut stream = match crawl(fetcher, &args.url, opts).await {
        Ok(stream) => stream,
        Err(CrawlError::InvalidArgument(msg)) => {
            eprintln!("invalid URL: {msg}");
            return ExitCode::from(1);
        }
        Err(err) => {
            eprintln!("argument error: {err}");
            return ExitCode::from(2);
        }
    };

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = stream.next() => {
                match result {
                    Some(Ok(page)) => {
                        let record = PageLine {
                            url: page.url.as_str(),
                            links: page.links.iter().map(|u| u.as_str()).collect(),
                        };
                        match serde_json::to_string(&record) {
                            Ok(line) => println!("{line}"),
                            Err(err) => eprintln!("failed to serialize result: {err}"),
                        }
                    }
                    Some(Err(err)) => {
                        eprintln!("crawl failed: {err}");
                        return ExitCode::FAILURE;
                    }
                    None => return ExitCode::SUCCESS,
                }
            }
            _ = &mut ctrl_c => {
                eprintln!("interrupted");
                return ExitCode::SUCCESS;
            }
        }
    }
}

//! The crawl orchestrator: visited set, work queue, worker pool, result
//! stream, caps, and cancellation.
//!
//! Generalizes the teacher's recursive `Crawler::crawl` (which spawned one
//! async call per link and joined them) into the worker-pool + queue model
//! the spec requires: a fixed number of workers pull from a shared queue
//! instead of the call tree growing one task per link, which is what makes
//! `max_concurrency` an actual bound rather than a `Semaphore` permit count
//! racing an unbounded fan-out.

use crate::error::{CrawlError, FetchError};
use crate::extract::extract;
use crate::fetch::Fetcher;
use crate::normalize::{parse_and_normalize, same_host};
use crate::ratelimit::RateLimiter;
use crate::robots::RobotsOracle;
use futures::Stream;
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, Mutex, Notify, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A pending fetch, tagged with its parent (informational, used in logs)
/// and its traversal depth.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub url: Url,
    pub parent: Option<Url>,
    pub depth: usize,
}

/// A successfully fetched HTML page: its final (post-redirect) URL and the
/// URLs it references, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlResult {
    pub url: Url,
    pub links: Vec<Url>,
}

/// Tuning knobs for a single `crawl` call.
pub struct CrawlOptions {
    pub max_concurrency: usize,
    pub user_agent: String,
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub max_depth: Option<usize>,
    pub max_pages: Option<usize>,
    pub max_visited: Option<usize>,
    /// When `false`, `robots.txt` is never fetched and every URL is treated
    /// as allowed (no `Disallow` enforcement, no `Crawl-delay` lookup).
    pub respect_robots: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            user_agent: "*".to_string(),
            rate_limiter: None,
            max_depth: None,
            max_pages: None,
            max_visited: None,
            respect_robots: true,
        }
    }
}

struct Shared {
    visited: HashSet<Url>,
    queue: VecDeque<WorkItem>,
    in_progress: usize,
    pages_emitted: usize,
}

enum Dequeued {
    Item(WorkItem),
    Wait,
    Done,
}

fn try_dequeue(state: &mut Shared) -> Dequeued {
    if let Some(item) = state.queue.pop_front() {
        state.in_progress += 1;
        Dequeued::Item(item)
    } else if state.in_progress == 0 {
        Dequeued::Done
    } else {
        Dequeued::Wait
    }
}

struct WorkerCtx {
    shared: Arc<Mutex<Shared>>,
    progress_changed: Arc<Notify>,
    semaphore: Arc<Semaphore>,
    fetcher: Arc<dyn Fetcher>,
    robots: Arc<RobotsOracle>,
    rate_limiter: Option<Arc<RateLimiter>>,
    tx: mpsc::Sender<Result<CrawlResult, CrawlError>>,
    cancel: CancellationToken,
    seed: Url,
    opts: Arc<CrawlOptions>,
}

/// Awaits `fut`, but resolves to `None` immediately if `cancel` fires first.
async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

/// The lazy, cancellable output side of a crawl: a bounded stream of
/// `CrawlResult`s (or the one `Unexpected` error that ended the crawl early).
pub struct ResultStream {
    rx: mpsc::Receiver<Result<CrawlResult, CrawlError>>,
    cancel: CancellationToken,
}

impl ResultStream {
    /// Reads the next result, or `None` once the stream has closed.
    pub async fn next(&mut self) -> Option<Result<CrawlResult, CrawlError>> {
        futures::StreamExt::next(self).await
    }

    /// Cancels the crawl: every in-flight fetch is abandoned, no new work is
    /// dequeued, and the stream closes. Also happens automatically when the
    /// stream is dropped.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for ResultStream {
    type Item = Result<CrawlResult, CrawlError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for ResultStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn authority(url: &Url) -> String {
    match url.port() {
        Some(port) => format!("{}:{port}", url.host_str().unwrap_or_default()),
        None => url.host_str().unwrap_or_default().to_string(),
    }
}

/// Fetches `seed`, extracts outbound same-host links, and recursively
/// crawls them under the bounds in `opts`. Returns a `ResultStream`
/// immediately; the crawl runs on spawned tasks.
pub async fn crawl(
    fetcher: Arc<dyn Fetcher>,
    seed: &str,
    opts: CrawlOptions,
) -> Result<ResultStream, CrawlError> {
    let seed_url = parse_and_normalize(seed)?;
    if seed_url.scheme() != "http" && seed_url.scheme() != "https" {
        return Err(CrawlError::InvalidArgument(format!(
            "seed must be an absolute http(s) URL, got: {seed}"
        )));
    }

    let robots = if opts.respect_robots {
        let robots_url = format!("{}://{}/robots.txt", seed_url.scheme(), authority(&seed_url));
        if let Some(rl) = &opts.rate_limiter {
            rl.acquire().await;
        }
        match fetcher.fetch(&robots_url).await {
            Ok(resp) if resp.status == 200 => RobotsOracle::from_body(&resp.body),
            Ok(_) => RobotsOracle::allow_all(),
            Err(_) => RobotsOracle::allow_all(),
        }
    } else {
        RobotsOracle::allow_all()
    };

    if let Some(rl) = &opts.rate_limiter {
        if let Some(delay) = robots.crawl_delay(&opts.user_agent) {
            if delay > 0.0 {
                rl.set_rate(1.0 / delay).await?;
            }
        }
    }

    let max_concurrency = opts.max_concurrency.max(1);
    let shared = Arc::new(Mutex::new(Shared {
        visited: HashSet::new(),
        queue: VecDeque::new(),
        in_progress: 0,
        pages_emitted: 0,
    }));
    {
        let mut state = shared.lock().await;
        state.visited.insert(seed_url.clone());
        state.queue.push_back(WorkItem {
            url: seed_url.clone(),
            parent: None,
            depth: 0,
        });
    }

    let (tx, rx) = mpsc::channel(max_concurrency);
    let progress_changed = Arc::new(Notify::new());
    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let cancel = CancellationToken::new();
    let robots = Arc::new(robots);
    let opts = Arc::new(opts);

    let mut workers = JoinSet::new();
    for _ in 0..max_concurrency {
        let ctx = Arc::new(WorkerCtx {
            shared: shared.clone(),
            progress_changed: progress_changed.clone(),
            semaphore: semaphore.clone(),
            fetcher: fetcher.clone(),
            robots: robots.clone(),
            rate_limiter: opts.rate_limiter.clone(),
            tx: tx.clone(),
            cancel: cancel.clone(),
            seed: seed_url.clone(),
            opts: opts.clone(),
        });
        workers.spawn(worker_loop(ctx));
    }
    drop(tx);

    tokio::spawn(async move { while workers.join_next().await.is_some() {} });

    Ok(ResultStream { rx, cancel })
}

async fn worker_loop(ctx: Arc<WorkerCtx>) {
    loop {
        if ctx.cancel.is_cancelled() {
            return;
        }

        let notified = ctx.progress_changed.notified();
        let dequeued = {
            let mut state = ctx.shared.lock().await;
            try_dequeue(&mut state)
        };

        let item = match dequeued {
            Dequeued::Done => return,
            Dequeued::Wait => {
                tokio::select! {
                    _ = notified => {},
                    _ = ctx.cancel.cancelled() => return,
                }
                continue;
            }
            Dequeued::Item(item) => item,
        };

        process_item(&ctx, item).await;

        let mut state = ctx.shared.lock().await;
        state.in_progress -= 1;
        drop(state);
        ctx.progress_changed.notify_waiters();
    }
}

async fn process_item(ctx: &WorkerCtx, item: WorkItem) {
    'body: {
        if let Some(max_pages) = ctx.opts.max_pages {
            let state = ctx.shared.lock().await;
            if state.pages_emitted >= max_pages {
                break 'body;
            }
        }

        let permit = ctx
            .semaphore
            .acquire()
            .await
            .expect("engine semaphore is never closed");

        if let Some(rl) = &ctx.rate_limiter {
            if cancellable(&ctx.cancel, rl.acquire()).await.is_none() {
                break 'body;
            }
        }

        let response = match cancellable(&ctx.cancel, ctx.fetcher.fetch(item.url.as_str())).await {
            None => break 'body,
            Some(Ok(response)) => response,
            Some(Err(FetchError::Network { url, source })) => {
                tracing::warn!(url, parent = ?item.parent, error = %source, "fetch failed, skipping");
                break 'body;
            }
            Some(Err(err @ FetchError::Timeout { .. })) => {
                tracing::warn!(url = %item.url, parent = ?item.parent, error = %err, "fetch timed out, skipping");
                break 'body;
            }
        };

        if response.status != 200 {
            tracing::warn!(
                url = %item.url,
                parent = ?item.parent,
                status = response.status,
                "non-200 status, skipping"
            );
            break 'body;
        }

        if !response.content_type.contains("text/html") {
            break 'body;
        }

        let final_url = match Url::parse(&response.url) {
            Ok(u) => crate::normalize::normalize(&u),
            Err(e) => {
                fail_unexpected(ctx, format!("final URL {} did not parse: {e}", response.url)).await;
                break 'body;
            }
        };

        {
            let mut state = ctx.shared.lock().await;
            state.visited.insert(final_url.clone());
        }

        if !same_host(&final_url, &ctx.seed) {
            break 'body;
        }

        let links = match extract(&response.body, &final_url) {
            Ok(links) => links,
            Err(e) => {
                fail_unexpected(ctx, format!("extraction failed for {final_url}: {e}")).await;
                break 'body;
            }
        };

        {
            let mut state = ctx.shared.lock().await;
            if let Some(max_pages) = ctx.opts.max_pages {
                if state.pages_emitted >= max_pages {
                    break 'body;
                }
            }
            state.pages_emitted += 1;
        }

        // Release the concurrency gate before the potentially blocking send
        // so other workers aren't starved while this one waits on a slow
        // consumer.
        drop(permit);

        let sent = cancellable(
            &ctx.cancel,
            ctx.tx.send(Ok(CrawlResult {
                url: final_url.clone(),
                links: links.clone(),
            })),
        )
        .await;
        match sent {
            None => break 'body,
            Some(Ok(())) => {}
            Some(Err(_)) => {
                // Consumer dropped the stream; tear the pool down.
                ctx.cancel.cancel();
                break 'body;
            }
        }

        if let Some(max_pages) = ctx.opts.max_pages {
            let state = ctx.shared.lock().await;
            if state.pages_emitted >= max_pages {
                break 'body;
            }
        }

        let mut state = ctx.shared.lock().await;
        for link in links {
            if state.visited.contains(&link) {
                continue;
            }
            if !same_host(&link, &ctx.seed) {
                continue;
            }
            if !ctx.robots.allowed(&ctx.opts.user_agent, link.as_str()) {
                continue;
            }
            if let Some(max_depth) = ctx.opts.max_depth {
                if item.depth + 1 > max_depth {
                    continue;
                }
            }
            if let Some(max_visited) = ctx.opts.max_visited {
                if state.visited.len() >= max_visited {
                    continue;
                }
            }

            state.visited.insert(link.clone());
            state.queue.push_back(WorkItem {
                url: link,
                parent: Some(final_url.clone()),
                depth: item.depth + 1,
            });
        }
        drop(state);
        ctx.progress_changed.notify_waiters();
    }
}

async fn fail_unexpected(ctx: &WorkerCtx, message: String) {
    let _ = ctx.tx.send(Err(CrawlError::Unexpected(message))).await;
    ctx.cancel.cancel();
}

//! Token-bucket rate limiter with a mutable refill rate.
//!
//! Mirrors `original_source/.../crawler/rate_limiter.py`'s `TokenBucket`:
//! an `asyncio.Lock`-guarded float bucket that refills lazily on each
//! acquire attempt and sleeps outside the lock between retries.

use crate::error::CrawlError;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

struct State {
    rate: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket: `rate` tokens/second refill, burst capacity equal to
/// `rate`. Up to `capacity` immediate acquisitions succeed before
/// throttling engages; long-run throughput is bounded by `rate`/second.
pub struct RateLimiter {
    state: Mutex<State>,
}

impl RateLimiter {
    /// Constructs a limiter with the given rate (tokens/second). Fails with
    /// `InvalidArgument` if `rate <= 0`.
    pub fn new(rate: f64) -> Result<Self, CrawlError> {
        if rate <= 0.0 {
            return Err(CrawlError::InvalidArgument(
                "rate limiter rate must be positive".into(),
            ));
        }

        Ok(Self {
            state: Mutex::new(State {
                rate,
                capacity: rate,
                tokens: rate,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Suspends until a token is available, then consumes it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;

                let now = Instant::now();
                let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * state.rate).min(state.capacity);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    Some(Duration::from_secs_f64(1.0 / state.rate))
                }
            };

            match wait {
                None => return,
                Some(d) => sleep(d).await,
            }
        }
    }

    /// Atomically updates the refill rate and burst capacity. Current token
    /// count is clamped to the new capacity on the next refill. Fails with
    /// `InvalidArgument` if `rate <= 0`.
    pub async fn set_rate(&self, rate: f64) -> Result<(), CrawlError> {
        if rate <= 0.0 {
            return Err(CrawlError::InvalidArgument(
                "rate limiter rate must be positive".into(),
            ));
        }

        let mut state = self.state.lock().await;
        state.rate = rate;
        state.capacity = rate;
        Ok(())
    }
}

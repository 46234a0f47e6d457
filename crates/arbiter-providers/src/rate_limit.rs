//! A token-bucket limiter bounding outbound request rate (§6).
//!
//! `requests_per_second: None` disables limiting entirely, matching the
//! `OPENROUTER_RATE_LIMIT` contract of "a `null`/absent value means
//! unbounded". When enabled, tokens refill continuously and `acquire`
//! awaits until at least one whole token is available.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    bucket: Option<Arc<Mutex<Bucket>>>,
}

impl RateLimiter {
    /// `requests_per_second = None` builds a limiter that never blocks.
    pub fn new(requests_per_second: Option<f64>) -> Self {
        let bucket = requests_per_second.map(|rate| {
            Arc::new(Mutex::new(Bucket {
                tokens: rate,
                capacity: rate,
                refill_per_sec: rate,
                last_refill: Instant::now(),
            }))
        });
        Self { bucket }
    }

    /// Default of 10 requests/sec, per the documented `OPENROUTER_RATE_LIMIT` default.
    pub fn default_rate() -> Self {
        Self::new(Some(10.0))
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Waits until a token is available, then spends it.
    pub async fn acquire(&self) {
        let Some(bucket) = &self.bucket else {
            return;
        };
        loop {
            let wait = {
                let mut guard = bucket.lock().await;
                guard.refill();
                if guard.tokens >= 1.0 {
                    guard.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - guard.tokens;
                    Some(Duration::from_secs_f64(deficit / guard.refill_per_sec))
                }
            };
            match wait {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }
}

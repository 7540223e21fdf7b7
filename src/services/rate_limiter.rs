use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;

/// Per-key admission control consulted before rate-limited handlers run
pub trait RateLimiter: Send + Sync {
    /// Count one request for `key`; `false` once the key is over its allowance
    fn allow(&self, key: &str, max_requests: u32, window: Duration) -> bool;

    /// Drop counters whose window has passed, returning how many were removed
    fn sweep(&self) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window counters.
///
/// The first request for a key, or the first one at or after its deadline,
/// restarts the window at `now` with a count of one. Bursts straddling a
/// boundary can therefore pass close to twice the allowance.
#[derive(Debug, Default)]
pub struct FixedWindowLimiter {
    counters: DashMap<String, Counter>,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_at(&self, key: &str, max_requests: u32, window: Duration, now: Instant) -> bool {
        let mut counter = self
            .counters
            .entry(key.to_string())
            .or_insert(Counter { count: 0, reset_at: now });

        if now >= counter.reset_at {
            counter.count = 1;
            counter.reset_at = now + window;
            return true;
        }

        counter.count = counter.count.saturating_add(1);
        counter.count <= max_requests
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, counter| counter.reset_at > now);
        before.saturating_sub(self.counters.len())
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn allow(&self, key: &str, max_requests: u32, window: Duration) -> bool {
        self.allow_at(key, max_requests, window, Instant::now())
    }

    fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }
}

/// Periodically evict expired counters so idle clients do not accumulate
pub fn spawn_sweeper(limiter: Arc<dyn RateLimiter>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let removed = limiter.sweep();
            if removed > 0 {
                tracing::debug!("Evicted {} expired rate-limit counters", removed);
            }
        }
    })
}

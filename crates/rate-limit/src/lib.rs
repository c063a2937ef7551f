//! Per-client admission control for userd.
//!
//! Implements a token-bucket rate limiter keyed by client address: buckets
//! are created lazily on first sight of a key, refill continuously with
//! elapsed time, and are evicted by a background sweep once idle. All state
//! is in memory and best-effort; nothing survives a restart.

#![deny(missing_docs)]

mod bucket;
mod store;

use std::sync::Arc;
use std::time::{Duration, Instant};

use config::RateLimitConfig;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use store::BucketStore;

/// Token-bucket rate limiter shared by all request workers.
///
/// Cloning is cheap and shares the underlying bucket store.
#[derive(Clone)]
pub struct RateLimiter(Arc<RateLimiterInner>);

struct RateLimiterInner {
    store: BucketStore,
    per_second: f64,
    burst: f64,
    sweep_interval: Duration,
    idle_after: Duration,
}

impl RateLimiter {
    /// Create a limiter from the validated configuration.
    ///
    /// A rate or burst of zero is a valid configuration that rejects every
    /// request; negative values are rejected by the config loader before we
    /// get here.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self(Arc::new(RateLimiterInner {
            store: BucketStore::new(),
            per_second: config.per_second,
            burst: config.burst,
            sweep_interval: config.sweep_interval,
            idle_after: config.idle_after,
        }))
    }

    /// Decide admission for one request from `key`.
    ///
    /// Never fails: exceeding the limit is a normal outcome surfaced as
    /// `false`, which the HTTP layer turns into a 429.
    pub fn allow(&self, key: &str) -> bool {
        let inner = &self.0;
        let admitted = inner
            .store
            .consume(key, inner.per_second, inner.burst, Instant::now());

        if !admitted {
            log::warn!("Rate limit exceeded for client {key}");
        }

        admitted
    }

    /// Number of buckets currently tracked. Exposed for diagnostics.
    pub fn tracked_keys(&self) -> usize {
        self.0.store.len()
    }

    /// Start the periodic eviction sweep.
    ///
    /// The task runs until `shutdown` is cancelled, so it follows the server
    /// lifecycle instead of leaking a detached loop per construction.
    pub fn spawn_sweeper(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let limiter = self.clone();

        tokio::spawn(async move {
            let inner = &limiter.0;
            let mut ticker = tokio::time::interval(inner.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // The first tick completes immediately; skip it so a sweep never
            // races the very first requests after startup.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = inner.store.sweep(inner.idle_after, Instant::now());

                        if evicted > 0 {
                            log::debug!("Rate limit sweep evicted {evicted} idle buckets");
                        }
                    }
                }
            }

            log::debug!("Rate limit sweeper stopped");
        })
    }
}

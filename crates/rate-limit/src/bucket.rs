use std::time::Instant;

/// Admission state for a single client key.
///
/// Credits refill continuously with elapsed time, capped at the configured
/// burst capacity, so a long-idle client gets at most one full burst.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl Bucket {
    /// A new bucket starts full, so the first requests from an unseen key
    /// are admitted up to the burst capacity.
    pub(crate) fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    /// Refill from the time elapsed since the last refill, then try to take
    /// one credit. Returns whether the request is admitted.
    ///
    /// A rejected call only applies the refill; it never drives `tokens`
    /// negative or consumes credits.
    pub(crate) fn try_consume(&mut self, per_second: f64, capacity: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * per_second).min(capacity);
        self.last_refill = now;
        self.last_seen = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Last time any admission check touched this bucket. Used by the
    /// eviction sweep: rejected checks also count as activity.
    pub(crate) fn last_seen(&self) -> Instant {
        self.last_seen
    }

    #[cfg(test)]
    pub(crate) fn tokens(&self) -> f64 {
        self.tokens
    }
}

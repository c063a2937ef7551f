use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::bucket::Bucket;

/// Concurrent map from client key to its bucket.
///
/// Buckets are created lazily on first use. The dashmap entry API holds the
/// shard lock across create-and-consume, so concurrent first requests for
/// the same key observe exactly one bucket and no update is lost, including
/// while a sweep runs on other shards.
pub(crate) struct BucketStore {
    buckets: DashMap<String, Bucket>,
}

impl BucketStore {
    pub(crate) fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    /// Fetch or lazily create the bucket for `key`, then run one admission
    /// check against it. The whole read-modify-write is serialized per key.
    pub(crate) fn consume(&self, key: &str, per_second: f64, capacity: f64, now: Instant) -> bool {
        let mut bucket = self
            .buckets
            .entry(key.to_owned())
            .or_insert_with(|| Bucket::new(capacity, now));

        bucket.try_consume(per_second, capacity, now)
    }

    /// Drop every bucket that has not been touched for `idle_after`.
    /// Returns the number of evicted buckets.
    pub(crate) fn sweep(&self, idle_after: Duration, now: Instant) -> usize {
        let before = self.buckets.len();

        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_seen()) < idle_after);

        before.saturating_sub(self.buckets.len())
    }

    pub(crate) fn len(&self) -> usize {
        self.buckets.len()
    }
}

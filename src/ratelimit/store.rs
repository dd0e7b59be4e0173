//! Bucket registry.
//!
//! The registry is process-local: every process counts its own consumption.
//! Deployments running several instances need a [`BucketStore`] backed by a
//! shared atomic counter to enforce a global quota.

use super::bucket::Bucket;
use super::config::LimitRule;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Result of a single atomic bucket operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSnapshot {
    /// Whether a token was taken
    pub admitted: bool,
    /// Tokens left after the operation
    pub remaining: u32,
    /// Bucket capacity
    pub capacity: u32,
    /// Time until the current window ends
    pub reset_after: Duration,
}

/// Keyed storage of buckets.
///
/// Implementations must make lookup-or-create and the refresh-then-consume
/// sequence of one key a single atomic step: concurrent calls on a key with
/// one token left admit exactly one of them.
pub trait BucketStore: Send + Sync {
    /// Refresh the bucket for `key` (creating it full if absent) and take one token.
    fn acquire(&self, key: &str, rule: LimitRule, now: DateTime<Utc>) -> BucketSnapshot;

    /// Refresh the bucket for `key` (creating it full if absent) without consuming.
    fn peek(&self, key: &str, rule: LimitRule, now: DateTime<Utc>) -> BucketSnapshot;

    /// Drop the bucket for `key`. Returns whether one existed.
    fn remove(&self, key: &str) -> bool;

    /// Drop buckets whose window has elapsed. Returns how many were dropped.
    ///
    /// A dropped bucket behaves exactly like a freshly created one, so
    /// pruning never changes an admission decision.
    fn prune_idle(&self, now: DateTime<Utc>) -> usize;

    /// Number of tracked buckets.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process bucket store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryBucketStore {
    buckets: DashMap<String, Bucket>,
}

impl InMemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the bucket for `key`, if tracked.
    pub fn get(&self, key: &str) -> Option<Bucket> {
        self.buckets.get(key).map(|b| b.clone())
    }

    fn with_bucket<R>(
        &self,
        key: &str,
        rule: LimitRule,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut Bucket) -> R,
    ) -> R {
        // The entry guard holds the shard write lock for the whole closure
        let mut entry = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::new(rule, now));
        f(entry.value_mut())
    }
}

impl BucketStore for InMemoryBucketStore {
    fn acquire(&self, key: &str, rule: LimitRule, now: DateTime<Utc>) -> BucketSnapshot {
        self.with_bucket(key, rule, now, |bucket| {
            let admitted = bucket.try_consume(now);
            BucketSnapshot {
                admitted,
                remaining: bucket.tokens_remaining(),
                capacity: bucket.capacity(),
                reset_after: bucket.reset_after(now),
            }
        })
    }

    fn peek(&self, key: &str, rule: LimitRule, now: DateTime<Utc>) -> BucketSnapshot {
        self.with_bucket(key, rule, now, |bucket| {
            let remaining = bucket.available(now);
            BucketSnapshot {
                admitted: false,
                remaining,
                capacity: bucket.capacity(),
                reset_after: bucket.reset_after(now),
            }
        })
    }

    fn remove(&self, key: &str) -> bool {
        self.buckets.remove(key).is_some()
    }

    fn prune_idle(&self, now: DateTime<Utc>) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_idle(now));
        before.saturating_sub(self.buckets.len())
    }

    fn len(&self) -> usize {
        self.buckets.len()
    }
}

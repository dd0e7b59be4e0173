//! Fixed-window rate limiter.
//!
//! # Tracing Events
//!
//! - `ratelimit.exceeded` - A request was denied
//! - `ratelimit.reset` - A bucket was reset explicitly

use super::config::{LimitRule, RateLimitConfig};
use super::store::{BucketSnapshot, BucketStore, InMemoryBucketStore};
use crate::clock::{SharedClock, ceil_secs, system_clock};
use crate::error::{AuthGuardError, Result};

/// Quota information for one key, suitable for response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Capacity of the window
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// Seconds until the current window ends
    pub reset_after_secs: u64,
}

impl RateLimitStatus {
    fn from_snapshot(snapshot: &BucketSnapshot) -> Self {
        Self {
            limit: snapshot.capacity,
            remaining: snapshot.remaining,
            reset_after_secs: ceil_secs(snapshot.reset_after),
        }
    }

    /// `X-RateLimit-*` header pairs.
    pub fn headers(&self) -> [(&'static str, String); 2] {
        [
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
        ]
    }
}

/// Admits or denies requests per `(limit type, key)` pair.
///
/// Buckets are keyed `limit_type:key` and created lazily on first reference.
///
/// # Example
///
/// ```rust
/// use authguard::ratelimit::{RateLimiter, RateLimitConfig, limit_types};
///
/// let limiter = RateLimiter::new(RateLimitConfig::default());
/// assert!(limiter.admit("203.0.113.5", limit_types::LOGIN).unwrap());
/// assert_eq!(limiter.remaining("203.0.113.5", limit_types::LOGIN).unwrap(), 4);
/// ```
pub struct RateLimiter<S: BucketStore = InMemoryBucketStore> {
    config: RateLimitConfig,
    store: S,
    clock: SharedClock,
}

impl RateLimiter<InMemoryBucketStore> {
    /// Create an in-process limiter using the system clock.
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_store(config, InMemoryBucketStore::new(), system_clock())
    }
}

impl<S: BucketStore> RateLimiter<S> {
    /// Create a limiter with an explicit bucket store and clock.
    pub fn with_store(config: RateLimitConfig, store: S, clock: SharedClock) -> Self {
        Self {
            config,
            store,
            clock,
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    // Rules edited in place after `build()` are checked here as well
    fn rule(&self, limit_type: &str) -> Result<LimitRule> {
        let rule = self.config.rule(limit_type).ok_or_else(|| {
            AuthGuardError::configuration(format!("Unknown rate limit type: {}", limit_type))
        })?;
        rule.validate(limit_type)?;
        Ok(rule)
    }

    fn bucket_key(key: &str, limit_type: &str) -> String {
        format!("{}:{}", limit_type, key)
    }

    fn acquire(&self, key: &str, limit_type: &str) -> Result<BucketSnapshot> {
        let rule = self.rule(limit_type)?;
        let snapshot = self
            .store
            .acquire(&Self::bucket_key(key, limit_type), rule, self.clock.now());

        if !snapshot.admitted {
            tracing::warn!(
                target: "ratelimit.exceeded",
                key = %key,
                limit_type = %limit_type,
                capacity = rule.capacity,
                window_secs = rule.window_seconds,
                "Rate limit exceeded"
            );
        }

        Ok(snapshot)
    }

    /// Take one token for `key`. Returns whether the request is admitted.
    pub fn admit(&self, key: &str, limit_type: &str) -> Result<bool> {
        Ok(self.acquire(key, limit_type)?.admitted)
    }

    /// Take one token for `key`, failing with `RateLimitExceeded` when none is left.
    ///
    /// On success returns the quota left after this request.
    pub fn check(&self, key: &str, limit_type: &str) -> Result<RateLimitStatus> {
        let snapshot = self.acquire(key, limit_type)?;
        let status = RateLimitStatus::from_snapshot(&snapshot);

        if snapshot.admitted {
            Ok(status)
        } else {
            Err(AuthGuardError::rate_limited(
                limit_type,
                status.reset_after_secs.max(1),
            ))
        }
    }

    /// Tokens left for `key` in the current window, without consuming one.
    pub fn remaining(&self, key: &str, limit_type: &str) -> Result<u32> {
        Ok(self.status(key, limit_type)?.remaining)
    }

    /// Quota information for `key`, without consuming a token.
    pub fn status(&self, key: &str, limit_type: &str) -> Result<RateLimitStatus> {
        let rule = self.rule(limit_type)?;
        let snapshot = self
            .store
            .peek(&Self::bucket_key(key, limit_type), rule, self.clock.now());
        Ok(RateLimitStatus::from_snapshot(&snapshot))
    }

    /// Forget the bucket for `key`, restoring the full quota.
    ///
    /// Returns whether a bucket existed.
    pub fn reset(&self, key: &str, limit_type: &str) -> bool {
        let removed = self.store.remove(&Self::bucket_key(key, limit_type));

        tracing::info!(
            target: "ratelimit.reset",
            key = %key,
            limit_type = %limit_type,
            existed = removed,
            "Rate limit reset"
        );

        removed
    }

    /// Drop buckets whose window has elapsed.
    pub fn prune_idle(&self) -> usize {
        self.store.prune_idle(self.clock.now())
    }

    /// Get the configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

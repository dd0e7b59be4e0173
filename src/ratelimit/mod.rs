//! Request rate limiting.
//!
//! Fixed-window counters keyed by `(limit type, identity)`. Limit types are
//! a data-driven table (see [`RateLimitConfig`]); identities are computed by
//! the caller (see [`RateLimitKey`]).

mod bucket;
mod config;
mod key;
mod limiter;
mod store;

pub use bucket::Bucket;
pub use config::{LimitRule, RateLimitConfig, RateLimitConfigBuilder, limit_types, parse_rule};
pub use key::{RateLimitKey, client_ip_from_headers};
pub use limiter::{RateLimitStatus, RateLimiter};
pub use store::{BucketSnapshot, BucketStore, InMemoryBucketStore};

//! authguard - request rate limiting, refresh token rotation and TOTP
//! two-factor authentication for Rust services
//!
//! The crate covers the security core an authentication flow calls into. It
//! does not do HTTP or persistence itself: stores and the identity lookup are
//! traits, each with an in-process implementation.
//!
//! # Features
//!
//! - **Rate limiting**: fixed-window counters per `(limit type, key)` with a
//!   data-driven limit table
//! - **Refresh tokens**: opaque rotating tokens, one active session per user,
//!   periodic cleanup and paired JWT access tokens
//! - **Two-factor**: RFC 6238 TOTP codes and single-use backup codes
//! - **Testing**: manual clock and collaborator fakes
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use authguard::{ConfigBuilder, RateLimiter, limit_types};
//!
//! fn main() -> authguard::Result<()> {
//!     // Initialize logging
//!     authguard::init_tracing();
//!
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     let limiter = RateLimiter::new(config.rate_limit);
//!
//!     if let Err(e) = limiter.check("203.0.113.5", limit_types::LOGIN) {
//!         eprintln!("{} (HTTP {})", e.safe_message(), e.status_code());
//!     }
//!     Ok(())
//! }
//! ```

#![allow(async_fn_in_trait)] // async_trait macro handles Send/Sync bounds properly

pub mod auth;
pub mod clock;
mod config;
mod error;
pub mod ratelimit;
pub mod testing;
pub mod utils;

// Re-exports for public API
pub use auth::mfa::{
    InMemoryTwoFactorStore, TwoFactorAuthenticator, TwoFactorConfig, TwoFactorSetup,
    TwoFactorStore,
};
pub use auth::{
    InMemoryRefreshTokenStore, JwtIssuer, JwtIssuerConfig, RefreshToken, RefreshTokenConfig,
    RefreshTokenManager, RefreshTokenStore, RotationOrder, TokenCleanupTask, TokenPair,
    UserDirectory,
};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{Config, ConfigBuilder, LoggingConfig};
pub use error::{AuthGuardError, Result};
pub use ratelimit::{
    LimitRule, RateLimitConfig, RateLimitConfigBuilder, RateLimitKey, RateLimitStatus,
    RateLimiter, limit_types,
};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// This should be called early in your application, typically in main().
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "auth.token=debug")
/// - `AUTHGUARD_LOG_JSON`: Set to "true" for JSON formatted logs
///
/// # Example
///
/// ```rust,no_run
/// authguard::init_tracing();
/// ```
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("AUTHGUARD_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing with a custom configuration
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

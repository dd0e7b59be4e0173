//! Session continuation and second-factor authentication.
//!
//! - [`RefreshTokenManager`]: opaque rotating refresh tokens with a single
//!   active session per user
//! - [`TokenCleanupTask`]: periodic removal of expired and revoked tokens
//! - [`JwtIssuer`]: short-lived access tokens paired with each refresh
//! - [`mfa`]: TOTP codes and backup codes

pub mod cleanup;
pub mod config;
pub mod jwt_issuer;
pub mod mfa;
pub mod refresh;
pub mod storage;
pub mod token;

pub use cleanup::TokenCleanupTask;
pub use config::{RefreshTokenConfig, RefreshTokenConfigBuilder, RotationOrder};
pub use jwt_issuer::{
    AccessTokenClaims, AccessTokenIssuer, IssuedAccessToken, JwtIssuer, JwtIssuerConfig,
    TokenSubject,
};
pub use refresh::RefreshTokenManager;
pub use storage::{ConsumeOutcome, InMemoryRefreshTokenStore, RefreshTokenStore, UserDirectory};
pub use token::{MIN_TOKEN_BYTES, RefreshToken, TokenPair, generate_opaque_token};

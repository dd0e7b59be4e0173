use crate::auth::token::MIN_TOKEN_BYTES;
use crate::clock::MAX_PERIOD_SECONDS;
use crate::error::{AuthGuardError, Result};
use crate::utils::{get_env_with_prefix, parse_env_or};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order of the two writes performed by a refresh token rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationOrder {
    /// Revoke the presented token, then create its successor.
    ///
    /// If creation fails after the revoke, the session is gone and the user
    /// has to log in again.
    #[default]
    RevokeThenCreate,
    /// Prepare the successor first, then atomically revoke the presented
    /// token and store the successor. A failed rotation leaves the presented
    /// token usable.
    CreateThenRevoke,
}

impl RotationOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RevokeThenCreate => "revoke_then_create",
            Self::CreateThenRevoke => "create_then_revoke",
        }
    }
}

impl fmt::Display for RotationOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotationOrder {
    type Err = AuthGuardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "revoke_then_create" => Ok(Self::RevokeThenCreate),
            "create_then_revoke" => Ok(Self::CreateThenRevoke),
            other => Err(AuthGuardError::configuration(format!(
                "Unknown rotation order: {}. Must be revoke_then_create or create_then_revoke",
                other
            ))),
        }
    }
}

/// Refresh token configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RefreshTokenConfig {
    /// Lifetime of a refresh token in seconds (default: 7 days)
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Random bytes per token (default: 64, minimum: 64)
    #[serde(default = "default_token_bytes")]
    pub token_bytes: usize,
    #[serde(default)]
    pub rotation_order: RotationOrder,
    /// Period of the expired/revoked token sweep in seconds (default: 1 day)
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

impl Default for RefreshTokenConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            token_bytes: default_token_bytes(),
            rotation_order: RotationOrder::default(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

fn default_ttl_seconds() -> u64 {
    7 * 24 * 60 * 60 // 7 days
}

fn default_token_bytes() -> usize {
    MIN_TOKEN_BYTES
}

fn default_cleanup_interval_seconds() -> u64 {
    24 * 60 * 60
}

impl RefreshTokenConfig {
    pub fn builder() -> RefreshTokenConfigBuilder {
        RefreshTokenConfigBuilder::new()
    }

    /// Load from environment variables.
    ///
    /// Unset or unparsable values keep their defaults; an unknown rotation
    /// order is logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.ttl_seconds = parse_env_or("REFRESH_TOKEN_TTL_SECONDS", config.ttl_seconds);
        config.token_bytes = parse_env_or("REFRESH_TOKEN_BYTES", config.token_bytes);
        config.cleanup_interval_seconds = parse_env_or(
            "REFRESH_TOKEN_CLEANUP_INTERVAL_SECONDS",
            config.cleanup_interval_seconds,
        );
        if let Some(order) = get_env_with_prefix("REFRESH_TOKEN_ROTATION") {
            match order.parse() {
                Ok(order) => config.rotation_order = order,
                Err(e) => tracing::warn!(error = %e, "Ignoring REFRESH_TOKEN_ROTATION"),
            }
        }
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.ttl_seconds == 0 || self.ttl_seconds > MAX_PERIOD_SECONDS {
            return Err(AuthGuardError::configuration(format!(
                "Refresh token ttl_seconds must be between 1 and {}",
                MAX_PERIOD_SECONDS
            )));
        }
        if self.token_bytes < MIN_TOKEN_BYTES {
            return Err(AuthGuardError::configuration(format!(
                "Refresh token token_bytes must be at least {}",
                MIN_TOKEN_BYTES
            )));
        }
        if self.cleanup_interval_seconds == 0 || self.cleanup_interval_seconds > MAX_PERIOD_SECONDS {
            return Err(AuthGuardError::configuration(format!(
                "Refresh token cleanup_interval_seconds must be between 1 and {}",
                MAX_PERIOD_SECONDS
            )));
        }
        Ok(())
    }

    /// Token lifetime as a chrono duration.
    pub fn ttl(&self) -> chrono::Duration {
        crate::clock::seconds(self.ttl_seconds)
    }

    pub fn cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cleanup_interval_seconds)
    }
}

#[must_use = "builder does nothing until you call build()"]
pub struct RefreshTokenConfigBuilder {
    config: RefreshTokenConfig,
}

impl RefreshTokenConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RefreshTokenConfig::default(),
        }
    }

    pub fn ttl_seconds(mut self, secs: u64) -> Self {
        self.config.ttl_seconds = secs;
        self
    }

    pub fn token_bytes(mut self, bytes: usize) -> Self {
        self.config.token_bytes = bytes;
        self
    }

    pub fn rotation_order(mut self, order: RotationOrder) -> Self {
        self.config.rotation_order = order;
        self
    }

    pub fn cleanup_interval_seconds(mut self, secs: u64) -> Self {
        self.config.cleanup_interval_seconds = secs;
        self
    }

    pub fn build(self) -> Result<RefreshTokenConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for RefreshTokenConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RefreshTokenConfig::default();
        assert_eq!(config.ttl_seconds, 604_800);
        assert_eq!(config.token_bytes, 64);
        assert_eq!(config.rotation_order, RotationOrder::RevokeThenCreate);
        assert_eq!(config.cleanup_interval_seconds, 86_400);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rotation_order_parse() {
        assert_eq!(
            "create-then-revoke".parse::<RotationOrder>().unwrap(),
            RotationOrder::CreateThenRevoke
        );
        assert_eq!(
            " REVOKE_THEN_CREATE ".parse::<RotationOrder>().unwrap(),
            RotationOrder::RevokeThenCreate
        );
        assert!("sideways".parse::<RotationOrder>().is_err());
    }

    #[test]
    fn test_builder_validation() {
        assert!(RefreshTokenConfig::builder().token_bytes(32).build().is_err());
        assert!(RefreshTokenConfig::builder().ttl_seconds(0).build().is_err());
        assert!(
            RefreshTokenConfig::builder()
                .cleanup_interval_seconds(0)
                .build()
                .is_err()
        );

        assert!(RefreshTokenConfig::builder().ttl_seconds(u64::MAX).build().is_err());
        assert!(
            RefreshTokenConfig::builder()
                .ttl_seconds(MAX_PERIOD_SECONDS + 1)
                .build()
                .is_err()
        );
        assert!(
            RefreshTokenConfig::builder()
                .cleanup_interval_seconds(u64::MAX)
                .build()
                .is_err()
        );
        assert!(
            RefreshTokenConfig::builder()
                .ttl_seconds(MAX_PERIOD_SECONDS)
                .build()
                .is_ok()
        );

        let config = RefreshTokenConfig::builder()
            .ttl_seconds(3_600)
            .token_bytes(96)
            .rotation_order(RotationOrder::CreateThenRevoke)
            .build()
            .unwrap();
        assert_eq!(config.ttl().num_seconds(), 3_600);
        assert_eq!(config.token_bytes, 96);
    }

    #[test]
    fn test_serde_defaults() {
        let config: RefreshTokenConfig =
            serde_json::from_str(r#"{"rotation_order":"create_then_revoke"}"#).unwrap();
        assert_eq!(config.rotation_order, RotationOrder::CreateThenRevoke);
        assert_eq!(config.ttl_seconds, 604_800);
    }

    #[test]
    fn test_from_env() {
        unsafe {
            std::env::set_var("AUTHGUARD_REFRESH_TOKEN_TTL_SECONDS", "120");
            std::env::set_var("AUTHGUARD_REFRESH_TOKEN_ROTATION", "create_then_revoke");
        }
        let config = RefreshTokenConfig::from_env();
        unsafe {
            std::env::remove_var("AUTHGUARD_REFRESH_TOKEN_TTL_SECONDS");
            std::env::remove_var("AUTHGUARD_REFRESH_TOKEN_ROTATION");
        }
        assert_eq!(config.ttl_seconds, 120);
        assert_eq!(config.rotation_order, RotationOrder::CreateThenRevoke);
    }
}

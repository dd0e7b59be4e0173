use serde::{Deserialize, Serialize};

use crate::auth::RefreshTokenConfig;
use crate::auth::mfa::TwoFactorConfig;
use crate::error::AuthGuardError;
use crate::ratelimit::RateLimitConfig;
use crate::utils::get_env_with_prefix;

/// Main configuration for the authguard components
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub refresh: RefreshTokenConfig,
    #[serde(default)]
    pub two_factor: TwoFactorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

impl Config {
    /// Parse a JSON document; missing sections take their defaults.
    pub fn from_json_str(json: &str) -> crate::error::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| AuthGuardError::configuration(format!("Invalid config JSON: {}", e)))
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    pub fn with_refresh(mut self, refresh: RefreshTokenConfig) -> Self {
        self.config.refresh = refresh;
        self
    }

    pub fn with_two_factor(mut self, two_factor: TwoFactorConfig) -> Self {
        self.config.two_factor = two_factor;
        self
    }

    /// Load configuration from environment variables with AUTHGUARD_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }

        self.config.rate_limit = RateLimitConfig::from_env();
        self.config.refresh = RefreshTokenConfig::from_env();
        self.config.two_factor = TwoFactorConfig::from_env();

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if any section is invalid:
    /// - Invalid log level
    /// - A rate limit rule with zero capacity or window
    /// - Refresh token lifetime, entropy or cleanup period out of range
    /// - Two-factor issuer, backup code or secret settings out of range
    pub fn build(self) -> crate::error::Result<Config> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(AuthGuardError::configuration(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        self.config.rate_limit.validate()?;
        self.config.refresh.validate()?;
        self.config.two_factor.validate()?;

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

use crate::clock::MAX_PERIOD_SECONDS;
use crate::error::{AuthGuardError, Result};
use crate::utils::get_env_with_prefix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Built-in limit type tags.
pub mod limit_types {
    pub const LOGIN: &str = "login";
    pub const REGISTER: &str = "register";
    pub const API_GENERAL: &str = "api_general";
    pub const CONTENT_CREATE: &str = "content_create";
    pub const FILE_UPLOAD: &str = "file_upload";
    pub const SEARCH: &str = "search";
    pub const FOLLOW_ACTION: &str = "follow_action";
    pub const COMMENT_CREATE: &str = "comment_create";
    pub const EMAIL_SEND: &str = "email_send";
}

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * 60;

/// Capacity and window of one limit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct LimitRule {
    /// Requests admitted per window
    pub capacity: u32,
    /// Window length in seconds
    pub window_seconds: u64,
}

impl LimitRule {
    pub const fn new(capacity: u32, window_seconds: u64) -> Self {
        Self {
            capacity,
            window_seconds,
        }
    }

    pub const fn per_minute(capacity: u32) -> Self {
        Self::new(capacity, MINUTE)
    }

    pub const fn per_hour(capacity: u32) -> Self {
        Self::new(capacity, HOUR)
    }

    /// Window length as a chrono duration.
    pub fn window(&self) -> chrono::Duration {
        crate::clock::seconds(self.window_seconds)
    }

    /// Check capacity and window bounds for the limit type `name`.
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.capacity == 0 {
            return Err(AuthGuardError::configuration(format!(
                "Rate limit '{}' capacity must be greater than 0",
                name
            )));
        }
        if self.window_seconds == 0 || self.window_seconds > MAX_PERIOD_SECONDS {
            return Err(AuthGuardError::configuration(format!(
                "Rate limit '{}' window_seconds must be between 1 and {}",
                name, MAX_PERIOD_SECONDS
            )));
        }
        Ok(())
    }
}

/// Rate limiting configuration: a table from limit type tag to its rule.
///
/// New limit types are added as data (builder, JSON document or environment),
/// never as code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rules")]
    pub rules: BTreeMap<String, LimitRule>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

impl RateLimitConfig {
    /// Create a new RateLimitConfig builder seeded with the built-in rules
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::new()
    }

    /// A configuration without any rules.
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    /// Look up the rule for a limit type.
    pub fn rule(&self, limit_type: &str) -> Option<LimitRule> {
        self.rules.get(limit_type).copied()
    }

    /// Load rules from a JSON document, layered over the built-in rules.
    ///
    /// ```json
    /// { "rules": { "login": { "capacity": 10, "window_seconds": 60 } } }
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let overlay: RuleOverlay = serde_json::from_str(json)
            .map_err(|e| AuthGuardError::configuration(format!("Invalid rate limit rules: {}", e)))?;
        let mut config = Self::default();
        config.rules.extend(overlay.rules);
        config.validate()?;
        Ok(config)
    }

    /// Load rules from a JSON file, layered over the built-in rules.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AuthGuardError::configuration(format!(
                "Cannot read rate limit rules from {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&raw)
    }

    /// Load rate limit configuration from environment variables
    ///
    /// `RATE_LIMIT_RULES` holds comma separated `name=capacity/window_seconds`
    /// entries layered over the built-in rules. Malformed entries are skipped
    /// with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(raw) = get_env_with_prefix("RATE_LIMIT_RULES") {
            for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                match parse_rule(entry) {
                    Ok((name, rule)) => {
                        config.rules.insert(name, rule);
                    }
                    Err(e) => {
                        tracing::warn!(entry = %entry, error = %e, "Ignoring malformed rate limit rule");
                    }
                }
            }
        }

        config
    }

    /// Validate every rule.
    pub fn validate(&self) -> Result<()> {
        for (name, rule) in &self.rules {
            if name.trim().is_empty() {
                return Err(AuthGuardError::configuration(
                    "Rate limit type name must not be empty",
                ));
            }
            rule.validate(name)?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RuleOverlay {
    #[serde(default)]
    rules: BTreeMap<String, LimitRule>,
}

/// Parse a `name=capacity/window_seconds` entry.
pub fn parse_rule(entry: &str) -> Result<(String, LimitRule)> {
    let malformed = || {
        AuthGuardError::configuration(format!(
            "Expected name=capacity/window_seconds, got '{}'",
            entry
        ))
    };

    let (name, limit) = entry.split_once('=').ok_or_else(malformed)?;
    let (capacity, window) = limit.split_once('/').ok_or_else(malformed)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(malformed());
    }
    let capacity = capacity.trim().parse().map_err(|_| malformed())?;
    let window_seconds = window.trim().parse().map_err(|_| malformed())?;

    Ok((name.to_string(), LimitRule::new(capacity, window_seconds)))
}

/// Builder for RateLimitConfig
#[must_use = "builder does nothing until you call build()"]
pub struct RateLimitConfigBuilder {
    config: RateLimitConfig,
}

impl RateLimitConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RateLimitConfig::default(),
        }
    }

    /// Start from an empty table instead of the built-in rules.
    pub fn without_defaults(mut self) -> Self {
        self.config.rules.clear();
        self
    }

    /// Add or replace a rule.
    pub fn rule(mut self, limit_type: impl Into<String>, rule: LimitRule) -> Self {
        self.config.rules.insert(limit_type.into(), rule);
        self
    }

    /// Add or replace a rule from capacity and window seconds.
    pub fn limit(self, limit_type: impl Into<String>, capacity: u32, window_seconds: u64) -> Self {
        self.rule(limit_type, LimitRule::new(capacity, window_seconds))
    }

    pub fn build(self) -> Result<RateLimitConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for RateLimitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_rules() -> BTreeMap<String, LimitRule> {
    use limit_types::*;

    [
        (LOGIN, LimitRule::per_minute(5)),
        (REGISTER, LimitRule::per_minute(3)),
        (API_GENERAL, LimitRule::per_minute(100)),
        (CONTENT_CREATE, LimitRule::per_hour(10)),
        (FILE_UPLOAD, LimitRule::per_hour(20)),
        (SEARCH, LimitRule::per_minute(30)),
        (FOLLOW_ACTION, LimitRule::per_hour(50)),
        (COMMENT_CREATE, LimitRule::per_hour(30)),
        (EMAIL_SEND, LimitRule::per_hour(5)),
    ]
    .into_iter()
    .map(|(name, rule)| (name.to_string(), rule))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::limit_types::*;
    use super::*;

    #[test]
    fn test_default_table() {
        let config = RateLimitConfig::default();
        assert_eq!(config.rules.len(), 9);
        assert_eq!(config.rule(LOGIN), Some(LimitRule::new(5, 60)));
        assert_eq!(config.rule(REGISTER), Some(LimitRule::new(3, 60)));
        assert_eq!(config.rule(API_GENERAL), Some(LimitRule::new(100, 60)));
        assert_eq!(config.rule(CONTENT_CREATE), Some(LimitRule::new(10, 3600)));
        assert_eq!(config.rule(FILE_UPLOAD), Some(LimitRule::new(20, 3600)));
        assert_eq!(config.rule(SEARCH), Some(LimitRule::new(30, 60)));
        assert_eq!(config.rule(FOLLOW_ACTION), Some(LimitRule::new(50, 3600)));
        assert_eq!(config.rule(COMMENT_CREATE), Some(LimitRule::new(30, 3600)));
        assert_eq!(config.rule(EMAIL_SEND), Some(LimitRule::new(5, 3600)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RateLimitConfig::builder()
            .limit("password_reset", 2, 900)
            .rule(LOGIN, LimitRule::per_minute(10))
            .build()
            .unwrap();

        assert_eq!(config.rule("password_reset"), Some(LimitRule::new(2, 900)));
        assert_eq!(config.rule(LOGIN), Some(LimitRule::new(10, 60)));
        assert_eq!(config.rule(SEARCH), Some(LimitRule::new(30, 60)));
    }

    #[test]
    fn test_builder_without_defaults() {
        let config = RateLimitConfig::builder()
            .without_defaults()
            .limit("only", 1, 1)
            .build()
            .unwrap();
        assert_eq!(config.rules.len(), 1);
        assert!(config.rule(LOGIN).is_none());
    }

    #[test]
    fn test_builder_rejects_zero_values() {
        assert!(RateLimitConfig::builder().limit("x", 0, 60).build().is_err());
        assert!(RateLimitConfig::builder().limit("x", 5, 0).build().is_err());
    }

    #[test]
    fn test_builder_rejects_unbounded_window() {
        assert!(RateLimitConfig::builder().limit("daily", 5, u64::MAX).build().is_err());
        assert!(
            RateLimitConfig::builder()
                .limit("daily", 5, MAX_PERIOD_SECONDS + 1)
                .build()
                .is_err()
        );
        assert!(
            RateLimitConfig::builder()
                .limit("decade", 5, MAX_PERIOD_SECONDS)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_from_json_overlays_defaults() {
        let config = RateLimitConfig::from_json_str(
            r#"{"rules": {"login": {"capacity": 7, "window_seconds": 30},
                          "export": {"capacity": 1, "window_seconds": 86400}}}"#,
        )
        .unwrap();

        assert_eq!(config.rule(LOGIN), Some(LimitRule::new(7, 30)));
        assert_eq!(config.rule("export"), Some(LimitRule::new(1, 86400)));
        assert_eq!(config.rule(EMAIL_SEND), Some(LimitRule::new(5, 3600)));
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(RateLimitConfig::from_json_str("not json").is_err());
        assert!(RateLimitConfig::from_json_str(
            r#"{"rules": {"login": {"capacity": 0, "window_seconds": 30}}}"#
        )
        .is_err());
    }

    #[test]
    fn test_parse_rule() {
        assert_eq!(
            parse_rule("upload=20/3600").unwrap(),
            ("upload".to_string(), LimitRule::new(20, 3600))
        );
        assert_eq!(
            parse_rule(" login = 5 / 60 ").unwrap(),
            ("login".to_string(), LimitRule::new(5, 60))
        );
        assert!(parse_rule("login").is_err());
        assert!(parse_rule("login=5").is_err());
        assert!(parse_rule("=5/60").is_err());
        assert!(parse_rule("login=five/60").is_err());
    }

    #[test]
    fn test_from_env() {
        unsafe {
            std::env::set_var("AUTHGUARD_RATE_LIMIT_RULES", "login=9/120, broken, export=1/86400");
        }
        let config = RateLimitConfig::from_env();
        unsafe {
            std::env::remove_var("AUTHGUARD_RATE_LIMIT_RULES");
        }

        assert_eq!(config.rule(LOGIN), Some(LimitRule::new(9, 120)));
        assert_eq!(config.rule("export"), Some(LimitRule::new(1, 86400)));
        assert!(config.rule("broken").is_none());
    }
}

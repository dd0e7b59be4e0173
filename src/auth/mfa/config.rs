use crate::error::{AuthGuardError, Result};
use crate::utils::{get_env_with_prefix, parse_env_or};
use serde::{Deserialize, Serialize};

/// Minimum shared secret length in bytes (160 bits, the HMAC-SHA1 block output).
pub const MIN_SECRET_BYTES: usize = 20;

const MIN_BACKUP_CODE_DIGITS: u32 = 6;
const MAX_BACKUP_CODE_DIGITS: u32 = 12;

/// Two-factor authentication configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TwoFactorConfig {
    /// Issuer name shown in authenticator apps
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// Backup codes handed out per enrollment
    #[serde(default = "default_backup_code_count")]
    pub backup_code_count: usize,
    /// Digits per backup code
    #[serde(default = "default_backup_code_digits")]
    pub backup_code_digits: u32,
    /// Random bytes in the TOTP secret
    #[serde(default = "default_secret_bytes")]
    pub secret_bytes: usize,
}

impl Default for TwoFactorConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            backup_code_count: default_backup_code_count(),
            backup_code_digits: default_backup_code_digits(),
            secret_bytes: default_secret_bytes(),
        }
    }
}

fn default_issuer() -> String {
    "App".to_string()
}

fn default_backup_code_count() -> usize {
    10
}

fn default_backup_code_digits() -> u32 {
    8
}

fn default_secret_bytes() -> usize {
    MIN_SECRET_BYTES
}

impl TwoFactorConfig {
    /// Default configuration with the given issuer name.
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            ..Default::default()
        }
    }

    pub fn with_backup_code_count(mut self, count: usize) -> Self {
        self.backup_code_count = count;
        self
    }

    pub fn with_backup_code_digits(mut self, digits: u32) -> Self {
        self.backup_code_digits = digits;
        self
    }

    pub fn with_secret_bytes(mut self, bytes: usize) -> Self {
        self.secret_bytes = bytes;
        self
    }

    /// Load from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(issuer) = get_env_with_prefix("TWO_FACTOR_ISSUER") {
            config.issuer = issuer;
        }
        config.backup_code_count = parse_env_or("TWO_FACTOR_BACKUP_CODES", config.backup_code_count);
        config.backup_code_digits =
            parse_env_or("TWO_FACTOR_BACKUP_CODE_DIGITS", config.backup_code_digits);
        config.secret_bytes = parse_env_or("TWO_FACTOR_SECRET_BYTES", config.secret_bytes);
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.issuer.trim().is_empty() {
            return Err(AuthGuardError::configuration(
                "Two-factor issuer must not be empty",
            ));
        }
        if self.issuer.contains(':') {
            return Err(AuthGuardError::configuration(
                "Two-factor issuer must not contain ':'",
            ));
        }
        if self.backup_code_count == 0 {
            return Err(AuthGuardError::configuration(
                "Two-factor backup_code_count must be greater than 0",
            ));
        }
        if !(MIN_BACKUP_CODE_DIGITS..=MAX_BACKUP_CODE_DIGITS).contains(&self.backup_code_digits) {
            return Err(AuthGuardError::configuration(format!(
                "Two-factor backup_code_digits must be between {} and {}",
                MIN_BACKUP_CODE_DIGITS, MAX_BACKUP_CODE_DIGITS
            )));
        }
        if self.secret_bytes < MIN_SECRET_BYTES {
            return Err(AuthGuardError::configuration(format!(
                "Two-factor secret_bytes must be at least {}",
                MIN_SECRET_BYTES
            )));
        }
        Ok(())
    }
}

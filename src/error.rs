/// The main error type for authguard operations
#[derive(Debug, thiserror::Error)]
pub enum AuthGuardError {
    #[error("Rate limit exceeded for {limit_type}. Please try again in {retry_after_secs} seconds.")]
    RateLimitExceeded {
        limit_type: String,
        retry_after_secs: u64,
    },

    #[error("Invalid refresh token")]
    InvalidToken,

    #[error("Refresh token has been revoked")]
    RevokedToken,

    #[error("Refresh token has expired")]
    ExpiredToken,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Two-factor authentication is not configured")]
    NotConfigured,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Two-factor authentication is already enabled")]
    AlreadyEnabled,

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AuthGuardError {
    pub fn rate_limited(limit_type: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::RateLimitExceeded {
            limit_type: limit_type.into(),
            retry_after_secs,
        }
    }

    pub fn user_not_found(user_id: impl Into<String>) -> Self {
        Self::UserNotFound(user_id.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status an outer transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::RateLimitExceeded { .. } => 429,
            Self::InvalidToken | Self::RevokedToken | Self::ExpiredToken => 401,
            Self::UserNotFound(_) | Self::NotConfigured => 404,
            Self::InvalidCode => 400,
            Self::AlreadyEnabled => 409,
            Self::Configuration(_) | Self::Internal(_) | Self::Anyhow(_) => 500,
        }
    }

    /// Whether the failure was caused by the client rather than by this service.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Message that is safe to show to clients.
    ///
    /// Internal and configuration errors are replaced by a generic message so
    /// storage or setup details never reach a response body (CWE-209).
    pub fn safe_message(&self) -> String {
        match self {
            Self::Configuration(_) | Self::Internal(_) | Self::Anyhow(_) => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Seconds the client should wait before retrying, for rate limit errors.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimitExceeded {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, AuthGuardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthGuardError::rate_limited("login", 30).status_code(), 429);
        assert_eq!(AuthGuardError::InvalidToken.status_code(), 401);
        assert_eq!(AuthGuardError::RevokedToken.status_code(), 401);
        assert_eq!(AuthGuardError::ExpiredToken.status_code(), 401);
        assert_eq!(AuthGuardError::user_not_found("u-1").status_code(), 404);
        assert_eq!(AuthGuardError::NotConfigured.status_code(), 404);
        assert_eq!(AuthGuardError::InvalidCode.status_code(), 400);
        assert_eq!(AuthGuardError::AlreadyEnabled.status_code(), 409);
        assert_eq!(AuthGuardError::internal("boom").status_code(), 500);
    }

    #[test]
    fn test_safe_message_hides_internal_details() {
        let err = AuthGuardError::internal("connection pool exhausted on db-3");
        assert_eq!(err.safe_message(), "An internal error occurred");
        assert!(!err.is_client_error());

        let err = AuthGuardError::Anyhow(anyhow::anyhow!("redis timeout"));
        assert!(!err.safe_message().contains("redis"));

        let err = AuthGuardError::RevokedToken;
        assert_eq!(err.safe_message(), "Refresh token has been revoked");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_rate_limit_message_and_retry_after() {
        let err = AuthGuardError::rate_limited("login", 42);
        assert_eq!(err.retry_after_secs(), Some(42));
        assert!(err.to_string().contains("login"));
        assert!(err.to_string().contains("42 seconds"));
        assert_eq!(AuthGuardError::InvalidCode.retry_after_secs(), None);
    }
}

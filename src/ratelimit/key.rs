//! Caller-side key derivation.
//!
//! The limiter itself never inspects requests. Callers build the identity
//! part of a bucket key with these helpers and pass it in as a string.

use std::fmt;

/// Maximum IP address length (IPv6 max length).
const MAX_IP_LENGTH: usize = 45;

/// Truncate IP address to prevent unbounded keys from spoofed headers.
fn truncate_ip(ip: &str) -> &str {
    match ip.char_indices().nth(MAX_IP_LENGTH) {
        Some((idx, _)) => &ip[..idx],
        None => ip,
    }
}

/// Identity a limit is applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitKey {
    /// Limit by client IP address.
    Ip(String),
    /// Limit by authenticated user, falling back to the IP when no user is known.
    User { user_id: Option<String>, ip: String },
    /// Limit by IP under an explicit prefix (`prefix:ip`).
    Custom { prefix: String, ip: String },
}

impl RateLimitKey {
    pub fn ip(ip: impl Into<String>) -> Self {
        Self::Ip(ip.into())
    }

    pub fn user(user_id: Option<impl Into<String>>, ip: impl Into<String>) -> Self {
        Self::User {
            user_id: user_id.map(Into::into),
            ip: ip.into(),
        }
    }

    pub fn custom(prefix: impl Into<String>, ip: impl Into<String>) -> Self {
        Self::Custom {
            prefix: prefix.into(),
            ip: ip.into(),
        }
    }

    /// The identity string handed to the limiter.
    pub fn as_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip(ip) => f.write_str(truncate_ip(ip)),
            Self::User {
                user_id: Some(id), ..
            } if !id.is_empty() => f.write_str(id),
            Self::User { ip, .. } => f.write_str(truncate_ip(ip)),
            Self::Custom { prefix, ip } => write!(f, "{}:{}", prefix, truncate_ip(ip)),
        }
    }
}

/// Pick the client IP for a request.
///
/// With `trust_proxy` the first `X-Forwarded-For` hop wins, then `X-Real-IP`,
/// then the socket address. Without it only the socket address is used.
///
/// **SECURITY WARNING**: Only trust proxy headers behind a reverse proxy that
/// overwrites them, otherwise clients can pick their own bucket.
pub fn client_ip_from_headers(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    remote_addr: &str,
    trust_proxy: bool,
) -> String {
    if trust_proxy {
        if let Some(first) = forwarded_for
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return truncate_ip(first).to_string();
        }

        if let Some(real) = real_ip.map(str::trim).filter(|v| !v.is_empty()) {
            return truncate_ip(real).to_string();
        }
    }

    truncate_ip(remote_addr).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_key() {
        assert_eq!(RateLimitKey::ip("10.0.0.1").as_key(), "10.0.0.1");
    }

    #[test]
    fn test_user_key_falls_back_to_ip() {
        assert_eq!(RateLimitKey::user(Some("user-7"), "10.0.0.1").as_key(), "user-7");
        assert_eq!(RateLimitKey::user(None::<String>, "10.0.0.1").as_key(), "10.0.0.1");
        assert_eq!(RateLimitKey::user(Some(""), "10.0.0.1").as_key(), "10.0.0.1");
    }

    #[test]
    fn test_custom_key() {
        assert_eq!(
            RateLimitKey::custom("export", "10.0.0.1").as_key(),
            "export:10.0.0.1"
        );
    }

    #[test]
    fn test_long_ip_is_truncated() {
        let long = "1".repeat(200);
        assert_eq!(RateLimitKey::ip(long).as_key().len(), MAX_IP_LENGTH);
    }

    #[test]
    fn test_client_ip_trusting_proxy() {
        assert_eq!(
            client_ip_from_headers(Some("203.0.113.5, 10.0.0.2"), Some("198.51.100.1"), "10.0.0.9", true),
            "203.0.113.5"
        );
        assert_eq!(
            client_ip_from_headers(None, Some(" 198.51.100.1 "), "10.0.0.9", true),
            "198.51.100.1"
        );
        assert_eq!(
            client_ip_from_headers(Some(""), None, "10.0.0.9", true),
            "10.0.0.9"
        );
    }

    #[test]
    fn test_client_ip_ignores_headers_by_default() {
        assert_eq!(
            client_ip_from_headers(Some("203.0.113.5"), Some("198.51.100.1"), "10.0.0.9", false),
            "10.0.0.9"
        );
    }
}

//! Refresh token records and token pairs.

use crate::error::{AuthGuardError, Result};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Minimum entropy of an opaque refresh token, in bytes.
pub const MIN_TOKEN_BYTES: usize = 64;

/// A persisted session-continuation credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: String,
    /// Opaque secret handed to the client
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Build a fresh, non-revoked record for `user_id`.
    ///
    /// Fails with a `Configuration` error when `now + ttl` is not a
    /// representable instant.
    pub fn issue(
        user_id: impl Into<String>,
        token: String,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self> {
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            AuthGuardError::configuration(format!(
                "Refresh token lifetime of {}s overflows the expiry timestamp",
                ttl.num_seconds()
            ))
        })?;

        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            token,
            expires_at,
            revoked: false,
            created_at: now,
        })
    }

    /// Whether the token expired before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Neither revoked nor expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired(now)
    }
}

// The token string is a bearer secret; keep it out of debug output and logs.
impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshToken")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .field("revoked", &self.revoked)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Access credential paired with a rotated refresh token.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    /// Access token (short-lived)
    pub access_token: String,
    /// Refresh token (long-lived)
    pub refresh_token: String,
    /// Access token expiry in seconds
    pub expires_in: u64,
    /// When the refresh token expires
    pub refresh_expires_at: DateTime<Utc>,
    /// Token type (always "Bearer")
    pub token_type: &'static str,
}

/// Generate a cryptographically random, URL-safe opaque token.
pub fn generate_opaque_token(bytes: usize) -> String {
    use rand::RngCore;
    let mut buf = vec![0u8; bytes.max(MIN_TOKEN_BYTES)];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

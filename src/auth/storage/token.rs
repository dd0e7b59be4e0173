//! Refresh token storage trait.

use crate::auth::token::RefreshToken;
use crate::error::{AuthGuardError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Outcome of atomically validating and revoking a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The token was active and is now revoked. Holds the record as it was.
    Consumed(RefreshToken),
    /// No such token.
    NotFound,
    /// The token was already revoked.
    Revoked,
    /// The token expired.
    Expired,
}

impl ConsumeOutcome {
    /// The consumed record, or the matching validation error.
    pub fn into_result(self) -> Result<RefreshToken> {
        match self {
            Self::Consumed(record) => Ok(record),
            Self::NotFound => Err(AuthGuardError::InvalidToken),
            Self::Revoked => Err(AuthGuardError::RevokedToken),
            Self::Expired => Err(AuthGuardError::ExpiredToken),
        }
    }
}

/// Trait for persisting refresh tokens.
///
/// The conditional operations (`insert_exclusive`, `consume`, `swap`) must be
/// atomic with respect to each other: two concurrent `consume` calls on one
/// token yield exactly one `Consumed`.
///
/// # Example
///
/// ```rust,ignore
/// use authguard::auth::storage::{ConsumeOutcome, RefreshTokenStore};
/// use async_trait::async_trait;
///
/// struct PostgresTokenStore {
///     pool: PgPool,
/// }
///
/// #[async_trait]
/// impl RefreshTokenStore for PostgresTokenStore {
///     async fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<ConsumeOutcome> {
///         // UPDATE refresh_tokens SET revoked = true
///         // WHERE token = $1 AND revoked = false AND expires_at >= $2
///         // RETURNING *
///         // ... then classify a miss with a follow-up SELECT
///     }
///
///     // ... implement other methods
/// }
/// ```
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Find a token by its secret value.
    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>>;

    /// The newest active token of a user.
    async fn find_active_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>>;

    /// Revoke every non-revoked token of `token.user_id`, then insert `token`.
    ///
    /// Returns the number of tokens revoked.
    async fn insert_exclusive(&self, token: RefreshToken) -> Result<usize>;

    /// Validate and revoke `token` in one step.
    async fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<ConsumeOutcome>;

    /// Validate `old`; if active, revoke every token of its user and insert
    /// `replacement`, all in one step. Nothing is written otherwise.
    ///
    /// `replacement` must belong to the same user as `old`.
    async fn swap(
        &self,
        old: &str,
        replacement: RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome>;

    /// Revoke a single token. Returns whether it was active before.
    async fn revoke(&self, token: &str) -> Result<bool>;

    /// Revoke all tokens of a user. Returns how many were active before.
    async fn revoke_all_for_user(&self, user_id: &str) -> Result<usize>;

    /// Delete every token that expired before `now` or is revoked.
    async fn delete_expired_and_revoked(&self, now: DateTime<Utc>) -> Result<usize>;
}

#[async_trait]
impl<T: RefreshTokenStore + ?Sized> RefreshTokenStore for Arc<T> {
    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        (**self).find_by_token(token).await
    }

    async fn find_active_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>> {
        (**self).find_active_for_user(user_id, now).await
    }

    async fn insert_exclusive(&self, token: RefreshToken) -> Result<usize> {
        (**self).insert_exclusive(token).await
    }

    async fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<ConsumeOutcome> {
        (**self).consume(token, now).await
    }

    async fn swap(
        &self,
        old: &str,
        replacement: RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome> {
        (**self).swap(old, replacement, now).await
    }

    async fn revoke(&self, token: &str) -> Result<bool> {
        (**self).revoke(token).await
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> Result<usize> {
        (**self).revoke_all_for_user(user_id).await
    }

    async fn delete_expired_and_revoked(&self, now: DateTime<Utc>) -> Result<usize> {
        (**self).delete_expired_and_revoked(now).await
    }
}

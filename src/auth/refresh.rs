//! Refresh token issuance and rotation.
//!
//! Refresh tokens are opaque random strings persisted through a
//! [`RefreshTokenStore`]. Each user holds at most one active token: creating
//! a token revokes every earlier one, and presenting a token for rotation
//! spends it.
//!
//! This module emits tracing events for security monitoring:
//! - `auth.token.created` - New token issued (previous ones revoked)
//! - `auth.token.rotated` - Token exchanged for its successor
//! - `auth.token.refresh` - Successful refresh (new access + refresh token)
//! - `auth.token.invalid` - Unknown, revoked or expired token presented
//! - `auth.token.revoked` - Single token revoked (logout)
//! - `auth.token.revoke_all` - All user tokens revoked (security event)
//! - `auth.token.cleanup` - Expired and revoked tokens deleted

use crate::auth::config::{RefreshTokenConfig, RotationOrder};
use crate::auth::jwt_issuer::{AccessTokenIssuer, JwtIssuer, TokenSubject};
use crate::auth::storage::{RefreshTokenStore, UserDirectory};
use crate::auth::token::{RefreshToken, TokenPair, generate_opaque_token};
use crate::clock::{SharedClock, system_clock};
use crate::error::{AuthGuardError, Result};
use chrono::{DateTime, Utc};

/// Issues, validates, rotates and revokes refresh tokens.
///
/// # Rotation
///
/// A rotation spends the presented token and returns its successor. With the
/// default [`RotationOrder::RevokeThenCreate`] the presented token is revoked
/// first; a failure while storing the successor then ends the session.
/// [`RotationOrder::CreateThenRevoke`] writes both changes in one store
/// operation instead.
///
/// Either way, the validate-and-revoke step is a single atomic store call, so
/// two concurrent rotations of one token produce exactly one success.
///
/// # Example
///
/// ```rust,ignore
/// use authguard::auth::{JwtIssuer, JwtIssuerConfig, RefreshTokenManager};
/// use authguard::auth::storage::InMemoryRefreshTokenStore;
///
/// let manager = RefreshTokenManager::new(
///     InMemoryRefreshTokenStore::new(),
///     my_user_directory,
///     JwtIssuer::new(JwtIssuerConfig::with_secret("secret", "my-app"))?,
///     RefreshTokenConfig::default(),
/// );
///
/// let token = manager.create("user-123").await?;
/// let pair = manager.refresh(&token.token).await?;
/// ```
pub struct RefreshTokenManager<S, U, I = JwtIssuer>
where
    S: RefreshTokenStore,
    U: UserDirectory,
    I: AccessTokenIssuer,
{
    store: S,
    users: U,
    issuer: I,
    config: RefreshTokenConfig,
    clock: SharedClock,
}

impl<S, U, I> RefreshTokenManager<S, U, I>
where
    S: RefreshTokenStore,
    U: UserDirectory,
    I: AccessTokenIssuer,
{
    pub fn new(store: S, users: U, issuer: I, config: RefreshTokenConfig) -> Self {
        Self {
            store,
            users,
            issuer,
            config,
            clock: system_clock(),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &RefreshTokenConfig {
        &self.config
    }

    /// Issue a new refresh token for `user_id`, revoking all earlier ones.
    pub async fn create(&self, user_id: &str) -> Result<RefreshToken> {
        self.ensure_user_exists(user_id).await?;

        let record = self.new_record(user_id, self.clock.now())?;
        let revoked = self.store.insert_exclusive(record.clone()).await?;

        tracing::info!(
            target: "auth.token.created",
            user_id = %user_id,
            token_id = %record.id,
            revoked_previous = revoked,
            expires_at = %record.expires_at,
            "Refresh token created"
        );

        Ok(record)
    }

    /// Look up a token and check that it is neither revoked nor expired.
    pub async fn validate(&self, token: &str) -> Result<RefreshToken> {
        let now = self.clock.now();
        let record = match self.store.find_by_token(token).await? {
            Some(record) => record,
            None => return Err(self.rejected(AuthGuardError::InvalidToken, None)),
        };

        if record.revoked {
            return Err(self.rejected(AuthGuardError::RevokedToken, Some(&record)));
        }
        if record.is_expired(now) {
            return Err(self.rejected(AuthGuardError::ExpiredToken, Some(&record)));
        }

        Ok(record)
    }

    /// Spend `old_token` and return its successor for the same user.
    pub async fn rotate(&self, old_token: &str) -> Result<RefreshToken> {
        match self.config.rotation_order {
            RotationOrder::RevokeThenCreate => self.rotate_revoke_first(old_token).await,
            RotationOrder::CreateThenRevoke => self.rotate_create_first(old_token).await,
        }
    }

    async fn rotate_revoke_first(&self, old_token: &str) -> Result<RefreshToken> {
        let previous = self.consume(old_token).await?;

        match self.create(&previous.user_id).await {
            Ok(next) => {
                self.log_rotated(&previous, &next);
                Ok(next)
            }
            Err(e) => {
                tracing::error!(
                    target: "auth.token.rotated",
                    user_id = %previous.user_id,
                    token_id = %previous.id,
                    error = %e,
                    "Rotation failed after the presented token was revoked; session lost"
                );
                Err(e)
            }
        }
    }

    async fn rotate_create_first(&self, old_token: &str) -> Result<RefreshToken> {
        let current = self.validate(old_token).await?;
        self.ensure_user_exists(&current.user_id).await?;

        let now = self.clock.now();
        let next = self.new_record(&current.user_id, now)?;
        let previous = self
            .store
            .swap(old_token, next.clone(), now)
            .await?
            .into_result()
            .map_err(|e| self.rejected(e, Some(&current)))?;

        self.log_rotated(&previous, &next);
        Ok(next)
    }

    /// Rotate `old_token` and pair the successor with a fresh access token.
    pub async fn refresh(&self, old_token: &str) -> Result<TokenPair> {
        let next = self.rotate(old_token).await?;

        let user = self
            .users
            .find_user_by_id(&next.user_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(
                    target: "auth.token.invalid",
                    user_id = %next.user_id,
                    "Token refresh failed: user not found"
                );
                AuthGuardError::user_not_found(next.user_id.clone())
            })?;

        let mut subject = TokenSubject::new(next.user_id.clone());
        if let Some(email) = self.users.user_email(&user) {
            subject = subject.with_email(email);
        }
        if let Some(name) = self.users.user_name(&user) {
            subject = subject.with_name(name);
        }

        let access = self.issuer.issue_access_token(&subject, self.clock.now())?;

        tracing::info!(
            target: "auth.token.refresh",
            user_id = %next.user_id,
            token_id = %next.id,
            "Token refreshed successfully"
        );

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: next.token,
            expires_in: access.expires_in,
            refresh_expires_at: next.expires_at,
            token_type: "Bearer",
        })
    }

    /// Revoke a single token (logout). Returns whether it was active.
    pub async fn revoke(&self, token: &str) -> Result<bool> {
        let revoked = self.store.revoke(token).await?;

        if revoked {
            tracing::info!(target: "auth.token.revoked", "Refresh token revoked (logout)");
        }

        Ok(revoked)
    }

    /// Revoke all tokens of a user (password change, security event).
    pub async fn revoke_all(&self, user_id: &str) -> Result<usize> {
        let count = self.store.revoke_all_for_user(user_id).await?;

        tracing::warn!(
            target: "auth.token.revoke_all",
            user_id = %user_id,
            count = count,
            "All tokens revoked for user (security event)"
        );

        Ok(count)
    }

    /// Delete every token that expired before `now` or is revoked.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> Result<usize> {
        let deleted = self.store.delete_expired_and_revoked(now).await?;

        tracing::info!(
            target: "auth.token.cleanup",
            deleted = deleted,
            "Expired and revoked refresh tokens deleted"
        );

        Ok(deleted)
    }

    /// [`cleanup`](Self::cleanup) at the current time.
    pub async fn cleanup_now(&self) -> Result<usize> {
        self.cleanup(self.clock.now()).await
    }

    /// The user's active token, if any.
    pub async fn find_active_for_user(&self, user_id: &str) -> Result<Option<RefreshToken>> {
        self.store
            .find_active_for_user(user_id, self.clock.now())
            .await
    }

    async fn consume(&self, token: &str) -> Result<RefreshToken> {
        self.store
            .consume(token, self.clock.now())
            .await?
            .into_result()
            .map_err(|e| self.rejected(e, None))
    }

    async fn ensure_user_exists(&self, user_id: &str) -> Result<()> {
        if self.users.exists_user(user_id).await? {
            return Ok(());
        }
        tracing::warn!(
            target: "auth.token.invalid",
            user_id = %user_id,
            "Refresh token requested for unknown user"
        );
        Err(AuthGuardError::user_not_found(user_id))
    }

    fn new_record(&self, user_id: &str, now: DateTime<Utc>) -> Result<RefreshToken> {
        RefreshToken::issue(
            user_id,
            generate_opaque_token(self.config.token_bytes),
            now,
            self.config.ttl(),
        )
    }

    fn rejected(&self, error: AuthGuardError, record: Option<&RefreshToken>) -> AuthGuardError {
        match record {
            Some(record) => tracing::warn!(
                target: "auth.token.invalid",
                user_id = %record.user_id,
                token_id = %record.id,
                reason = %error,
                "Refresh token rejected"
            ),
            None => tracing::warn!(
                target: "auth.token.invalid",
                reason = %error,
                "Refresh token rejected"
            ),
        }
        error
    }

    fn log_rotated(&self, previous: &RefreshToken, next: &RefreshToken) {
        tracing::info!(
            target: "auth.token.rotated",
            user_id = %next.user_id,
            previous_token_id = %previous.id,
            token_id = %next.id,
            order = %self.config.rotation_order,
            "Refresh token rotated"
        );
    }
}

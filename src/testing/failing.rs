use crate::auth::storage::{ConsumeOutcome, RefreshTokenStore};
use crate::auth::token::RefreshToken;
use crate::error::{AuthGuardError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};

/// Wraps a refresh token store and fails every write that would add a token
/// while switched on. All other operations pass through.
pub struct FailingRefreshTokenStore<S> {
    inner: S,
    fail_inserts: AtomicBool,
}

impl<S: RefreshTokenStore> FailingRefreshTokenStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_inserts: AtomicBool::new(false),
        }
    }

    /// Switch insert failures on or off.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check_insert(&self) -> Result<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AuthGuardError::internal("Injected refresh token insert failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: RefreshTokenStore> RefreshTokenStore for FailingRefreshTokenStore<S> {
    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        self.inner.find_by_token(token).await
    }

    async fn find_active_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>> {
        self.inner.find_active_for_user(user_id, now).await
    }

    async fn insert_exclusive(&self, token: RefreshToken) -> Result<usize> {
        self.check_insert()?;
        self.inner.insert_exclusive(token).await
    }

    async fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<ConsumeOutcome> {
        self.inner.consume(token, now).await
    }

    async fn swap(
        &self,
        old: &str,
        replacement: RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome> {
        self.check_insert()?;
        self.inner.swap(old, replacement, now).await
    }

    async fn revoke(&self, token: &str) -> Result<bool> {
        self.inner.revoke(token).await
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> Result<usize> {
        self.inner.revoke_all_for_user(user_id).await
    }

    async fn delete_expired_and_revoked(&self, now: DateTime<Utc>) -> Result<usize> {
        self.inner.delete_expired_and_revoked(now).await
    }
}

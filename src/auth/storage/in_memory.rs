//! In-process refresh token store.

use super::token::{ConsumeOutcome, RefreshTokenStore};
use crate::auth::token::RefreshToken;
use crate::error::{AuthGuardError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Tokens {
    by_token: HashMap<String, RefreshToken>,
    by_user: HashMap<String, Vec<String>>,
}

impl Tokens {
    fn classify(&self, token: &str, now: DateTime<Utc>) -> ConsumeOutcome {
        match self.by_token.get(token) {
            None => ConsumeOutcome::NotFound,
            Some(record) if record.revoked => ConsumeOutcome::Revoked,
            Some(record) if record.is_expired(now) => ConsumeOutcome::Expired,
            Some(record) => ConsumeOutcome::Consumed(record.clone()),
        }
    }

    fn revoke_user(&mut self, user_id: &str) -> usize {
        let Some(tokens) = self.by_user.get(user_id) else {
            return 0;
        };
        let mut revoked = 0;
        for token in tokens {
            if let Some(record) = self.by_token.get_mut(token) {
                if !record.revoked {
                    record.revoked = true;
                    revoked += 1;
                }
            }
        }
        revoked
    }

    fn insert(&mut self, record: RefreshToken) {
        self.by_user
            .entry(record.user_id.clone())
            .or_default()
            .push(record.token.clone());
        self.by_token.insert(record.token.clone(), record);
    }
}

/// Refresh token store held in process memory.
///
/// A single lock guards both indexes, which makes every conditional
/// operation atomic.
///
/// **Note:** Tokens do not survive a restart. Production deployments should
/// implement [`RefreshTokenStore`] over a database with a unique index on
/// the token column.
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    inner: RwLock<Tokens>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tokens, revoked ones included.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_token
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a record as-is (fixtures and migrations).
    pub fn insert_raw(&self, record: RefreshToken) {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record);
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(inner.by_token.get(token).cloned())
    }

    async fn find_active_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(inner
            .by_user
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|t| inner.by_token.get(t))
            .filter(|r| r.is_active(now))
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn insert_exclusive(&self, token: RefreshToken) -> Result<usize> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.by_token.contains_key(&token.token) {
            return Err(AuthGuardError::internal("Duplicate refresh token value"));
        }
        let revoked = inner.revoke_user(&token.user_id);
        inner.insert(token);
        Ok(revoked)
    }

    async fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<ConsumeOutcome> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let outcome = inner.classify(token, now);
        if matches!(outcome, ConsumeOutcome::Consumed(_)) {
            if let Some(record) = inner.by_token.get_mut(token) {
                record.revoked = true;
            }
        }
        Ok(outcome)
    }

    async fn swap(
        &self,
        old: &str,
        replacement: RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let outcome = inner.classify(old, now);
        if let ConsumeOutcome::Consumed(ref record) = outcome {
            if record.user_id != replacement.user_id {
                return Err(AuthGuardError::internal(
                    "Replacement token belongs to a different user",
                ));
            }
            if inner.by_token.contains_key(&replacement.token) {
                return Err(AuthGuardError::internal("Duplicate refresh token value"));
            }
            inner.revoke_user(&record.user_id);
            inner.insert(replacement);
        }
        Ok(outcome)
    }

    async fn revoke(&self, token: &str) -> Result<bool> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        Ok(match inner.by_token.get_mut(token) {
            Some(record) if !record.revoked => {
                record.revoked = true;
                true
            }
            _ => false,
        })
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> Result<usize> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        Ok(inner.revoke_user(user_id))
    }

    async fn delete_expired_and_revoked(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let before = inner.by_token.len();
        inner
            .by_token
            .retain(|_, record| !record.revoked && !record.is_expired(now));

        let Tokens { by_token, by_user } = &mut *inner;
        by_user.retain(|_, tokens| {
            tokens.retain(|t| by_token.contains_key(t));
            !tokens.is_empty()
        });

        Ok(before - inner.by_token.len())
    }
}

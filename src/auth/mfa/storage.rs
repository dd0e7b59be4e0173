//! Two-factor storage trait.

use super::backup::BackupCodes;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Two-factor status for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoFactorStatus {
    /// No record.
    Unconfigured,
    /// Enrollment started but not confirmed with a code.
    Pending,
    /// Confirmed and enforced at login.
    Active,
}

/// Persisted two-factor enrollment of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoFactorRecord {
    pub id: Uuid,
    pub user_id: String,
    /// Base32 shared secret
    pub secret: String,
    pub backup_codes: BackupCodes,
    pub enabled: bool,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TwoFactorRecord {
    /// A fresh pending enrollment.
    pub fn pending(
        user_id: impl Into<String>,
        secret: String,
        backup_codes: BackupCodes,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            secret,
            backup_codes,
            enabled: false,
            verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> TwoFactorStatus {
        if self.enabled {
            TwoFactorStatus::Active
        } else {
            TwoFactorStatus::Pending
        }
    }
}

/// Trait for storing two-factor enrollments.
///
/// `insert_pending`, `activate` and `consume_backup_code` must be atomic per
/// user.
///
/// # Example
///
/// ```rust,ignore
/// use authguard::auth::mfa::TwoFactorStore;
/// use async_trait::async_trait;
///
/// struct MyTwoFactorStore {
///     db: DatabaseConnection,
/// }
///
/// #[async_trait]
/// impl TwoFactorStore for MyTwoFactorStore {
///     async fn find(&self, user_id: &str) -> Result<Option<TwoFactorRecord>> {
///         Ok(self.db.get_two_factor(user_id).await?)
///     }
///
///     // ... implement other methods
/// }
/// ```
#[async_trait]
pub trait TwoFactorStore: Send + Sync {
    /// The user's record, if any.
    async fn find(&self, user_id: &str) -> Result<Option<TwoFactorRecord>>;

    /// Store a pending record, replacing an earlier pending one.
    ///
    /// Returns `false` without writing when an active record exists.
    async fn insert_pending(&self, record: TwoFactorRecord) -> Result<bool>;

    /// Mark the user's record enabled and verified, provided it is still the
    /// record with id `record_id`.
    ///
    /// Returns `false` without writing when the record was deleted or
    /// replaced by another enrollment.
    async fn activate(&self, user_id: &str, record_id: Uuid, now: DateTime<Utc>) -> Result<bool>;

    /// Delete the record. Returns whether one existed.
    async fn delete(&self, user_id: &str) -> Result<bool>;

    /// Mark a backup code used if it matches an unused code of an active
    /// record. At most one caller may succeed per code.
    async fn consume_backup_code(
        &self,
        user_id: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;
}

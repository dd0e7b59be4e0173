//! Two-factor enrollment and login checks.
//!
//! This module emits tracing events for security monitoring:
//! - `auth.mfa.enable_requested` - Pending enrollment created
//! - `auth.mfa.enabled` - Enrollment confirmed with a TOTP code
//! - `auth.mfa.disabled` - Enrollment removed
//! - `auth.mfa.backup_code_used` - Backup code spent at login
//! - `auth.mfa.invalid_code` - Wrong code presented

use super::backup::{BackupCodeGenerator, BackupCodes};
use super::config::TwoFactorConfig;
use super::storage::{TwoFactorRecord, TwoFactorStatus, TwoFactorStore};
use super::totp::TotpManager;
use crate::clock::{SharedClock, system_clock};
use crate::error::{AuthGuardError, Result};
use chrono::{DateTime, Utc};

/// Secrets returned once when enrollment starts.
#[derive(Clone)]
pub struct TwoFactorSetup {
    /// Base32-encoded shared secret
    pub secret: String,
    /// Single-use recovery codes
    pub backup_codes: Vec<String>,
    /// URI for QR code (otpauth://...)
    pub provisioning_uri: String,
}

impl std::fmt::Debug for TwoFactorSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoFactorSetup")
            .field("secret", &"[redacted]")
            .field("backup_codes", &self.backup_codes.len())
            .finish()
    }
}

/// TOTP second factor with backup codes.
///
/// # Lifecycle
///
/// `enable` creates a pending enrollment, `verify` activates it with a valid
/// code, and `disable` removes it. Only active enrollments are enforced by
/// [`validate_code`](Self::validate_code).
///
/// # Example
///
/// ```rust,ignore
/// use authguard::auth::mfa::{InMemoryTwoFactorStore, TwoFactorAuthenticator, TwoFactorConfig};
///
/// let mfa = TwoFactorAuthenticator::new(InMemoryTwoFactorStore::new(), TwoFactorConfig::new("MyApp"));
///
/// let setup = mfa.enable("user-123").await?;
/// // Show setup.provisioning_uri as a QR code and setup.backup_codes once
///
/// mfa.verify("user-123", &code_from_app).await?;
/// assert!(mfa.validate_code("user-123", &next_code).await?);
/// ```
pub struct TwoFactorAuthenticator<S: TwoFactorStore> {
    store: S,
    totp: TotpManager,
    backup_codes: BackupCodeGenerator,
    config: TwoFactorConfig,
    clock: SharedClock,
}

impl<S: TwoFactorStore> TwoFactorAuthenticator<S> {
    pub fn new(store: S, config: TwoFactorConfig) -> Self {
        Self {
            store,
            totp: TotpManager::new(config.issuer.clone()),
            backup_codes: BackupCodeGenerator::new()
                .with_count(config.backup_code_count)
                .with_digits(config.backup_code_digits),
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

    pub fn totp(&self) -> &TotpManager {
        &self.totp
    }

    /// Start enrollment: new secret and backup codes, stored as pending.
    ///
    /// A pending enrollment is replaced. Fails with `AlreadyEnabled` when the
    /// user has an active one.
    pub async fn enable(&self, user_id: &str) -> Result<TwoFactorSetup> {
        if let Some(record) = self.store.find(user_id).await? {
            if record.enabled {
                return Err(AuthGuardError::AlreadyEnabled);
            }
        }

        let secret = self.totp.generate_secret(self.config.secret_bytes);
        let codes = self.backup_codes.generate();
        let provisioning_uri = self.totp.provisioning_uri(&secret, user_id)?;

        let record = TwoFactorRecord::pending(
            user_id,
            secret.clone(),
            BackupCodes::new(codes.iter().cloned()),
            self.clock.now(),
        );
        if !self.store.insert_pending(record).await? {
            return Err(AuthGuardError::AlreadyEnabled);
        }

        tracing::info!(
            target: "auth.mfa.enable_requested",
            user_id = %user_id,
            backup_codes = codes.len(),
            "Two-factor enrollment started"
        );

        Ok(TwoFactorSetup {
            secret,
            backup_codes: codes,
            provisioning_uri,
        })
    }

    /// Confirm enrollment with the current TOTP code.
    pub async fn verify(&self, user_id: &str, code: &str) -> Result<()> {
        let record = self.require_record(user_id).await?;
        let now = self.clock.now();
        self.require_totp(&record, code, now)?;

        if !self.store.activate(user_id, record.id, now).await? {
            // Replaced or deleted between the lookup and the update
            return Err(match self.store.find(user_id).await? {
                Some(_) => AuthGuardError::InvalidCode,
                None => AuthGuardError::NotConfigured,
            });
        }

        tracing::info!(target: "auth.mfa.enabled", user_id = %user_id, "Two-factor enabled");
        Ok(())
    }

    /// Remove enrollment after checking the current TOTP code.
    ///
    /// Backup codes are not accepted here.
    pub async fn disable(&self, user_id: &str, code: &str) -> Result<()> {
        let record = self.require_record(user_id).await?;
        self.require_totp(&record, code, self.clock.now())?;

        self.store.delete(user_id).await?;

        tracing::warn!(target: "auth.mfa.disabled", user_id = %user_id, "Two-factor disabled");
        Ok(())
    }

    /// Check a login code: the current TOTP code or an unused backup code.
    ///
    /// Returns `false` when two-factor is not active for the user. A matching
    /// backup code is spent. A stored secret that cannot be decoded is logged
    /// and rejects every TOTP code.
    pub async fn validate_code(&self, user_id: &str, code: &str) -> Result<bool> {
        let record = match self.store.find(user_id).await? {
            Some(record) if record.enabled => record,
            _ => return Ok(false),
        };
        let now = self.clock.now();

        match self.totp.verify_at(&record.secret, code, unix_seconds(now)) {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) => {
                tracing::error!(
                    target: "auth.mfa.secret_invalid",
                    user_id = %user_id,
                    error = %e,
                    "Stored TOTP secret could not be decoded"
                );
            }
        }

        if self.store.consume_backup_code(user_id, code, now).await? {
            tracing::info!(
                target: "auth.mfa.backup_code_used",
                user_id = %user_id,
                "Backup code used for login"
            );
            return Ok(true);
        }

        tracing::warn!(
            target: "auth.mfa.invalid_code",
            user_id = %user_id,
            "Invalid two-factor code at login"
        );
        Ok(false)
    }

    /// Whether two-factor is active for the user.
    pub async fn is_enabled(&self, user_id: &str) -> Result<bool> {
        Ok(self.status(user_id).await? == TwoFactorStatus::Active)
    }

    pub async fn status(&self, user_id: &str) -> Result<TwoFactorStatus> {
        Ok(self
            .store
            .find(user_id)
            .await?
            .map_or(TwoFactorStatus::Unconfigured, |r| r.status()))
    }

    /// Unused backup codes of the user (0 without a record).
    pub async fn backup_codes_remaining(&self, user_id: &str) -> Result<usize> {
        Ok(self
            .store
            .find(user_id)
            .await?
            .map_or(0, |r| r.backup_codes.remaining()))
    }

    async fn require_record(&self, user_id: &str) -> Result<TwoFactorRecord> {
        self.store
            .find(user_id)
            .await?
            .ok_or(AuthGuardError::NotConfigured)
    }

    fn require_totp(&self, record: &TwoFactorRecord, code: &str, now: DateTime<Utc>) -> Result<()> {
        if self.totp.verify_at(&record.secret, code, unix_seconds(now))? {
            return Ok(());
        }
        tracing::warn!(
            target: "auth.mfa.invalid_code",
            user_id = %record.user_id,
            "Invalid TOTP code"
        );
        Err(AuthGuardError::InvalidCode)
    }
}

fn unix_seconds(now: DateTime<Utc>) -> u64 {
    u64::try_from(now.timestamp()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::mfa::in_memory::InMemoryTwoFactorStore;
    use crate::clock::{Clock, ManualClock};
    use std::time::Duration;

    fn authenticator(clock: &ManualClock) -> TwoFactorAuthenticator<InMemoryTwoFactorStore> {
        TwoFactorAuthenticator::new(InMemoryTwoFactorStore::new(), TwoFactorConfig::new("TestApp"))
            .with_clock(clock.shared())
    }

    fn current_code(mfa: &TwoFactorAuthenticator<InMemoryTwoFactorStore>, secret: &str, clock: &ManualClock) -> String {
        mfa.totp()
            .generate_at(secret, unix_seconds(clock.now()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_enable_returns_setup() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let mfa = authenticator(&clock);

        let setup = mfa.enable("user-123").await.unwrap();
        assert_eq!(setup.secret.len(), 32);
        assert_eq!(setup.backup_codes.len(), 10);
        assert!(setup.backup_codes.iter().all(|c| c.len() == 8));
        assert!(setup.provisioning_uri.starts_with("otpauth://totp/"));

        assert_eq!(mfa.status("user-123").await.unwrap(), TwoFactorStatus::Pending);
        assert!(!mfa.is_enabled("user-123").await.unwrap());
        assert_eq!(mfa.backup_codes_remaining("user-123").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_enable_twice_while_pending_replaces_secret() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let mfa = authenticator(&clock);

        let first = mfa.enable("user-123").await.unwrap();
        let second = mfa.enable("user-123").await.unwrap();
        assert_ne!(first.secret, second.secret);

        let stale = current_code(&mfa, &first.secret, &clock);
        let fresh = current_code(&mfa, &second.secret, &clock);
        if stale != fresh {
            assert!(matches!(
                mfa.verify("user-123", &stale).await,
                Err(AuthGuardError::InvalidCode)
            ));
        }
        mfa.verify("user-123", &fresh).await.unwrap();
    }

    #[tokio::test]
    async fn test_enable_when_active_fails() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let mfa = authenticator(&clock);

        let setup = mfa.enable("user-123").await.unwrap();
        mfa.verify("user-123", &current_code(&mfa, &setup.secret, &clock))
            .await
            .unwrap();

        assert!(matches!(
            mfa.enable("user-123").await,
            Err(AuthGuardError::AlreadyEnabled)
        ));
    }

    #[tokio::test]
    async fn test_verify_and_disable_need_record() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let mfa = authenticator(&clock);

        assert!(matches!(
            mfa.verify("user-123", "123456").await,
            Err(AuthGuardError::NotConfigured)
        ));
        assert!(matches!(
            mfa.disable("user-123", "123456").await,
            Err(AuthGuardError::NotConfigured)
        ));
        assert_eq!(mfa.status("user-123").await.unwrap(), TwoFactorStatus::Unconfigured);
        assert_eq!(mfa.backup_codes_remaining("user-123").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_verify_rejects_adjacent_steps() {
        let clock = ManualClock::at_unix(1_700_000_010);
        let mfa = authenticator(&clock);
        let setup = mfa.enable("user-123").await.unwrap();

        let code = current_code(&mfa, &setup.secret, &clock);
        clock.advance(Duration::from_secs(30));
        if current_code(&mfa, &setup.secret, &clock) != code {
            assert!(matches!(
                mfa.verify("user-123", &code).await,
                Err(AuthGuardError::InvalidCode)
            ));
        }
        assert!(!mfa.is_enabled("user-123").await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_record_not_enforced() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let mfa = authenticator(&clock);
        let setup = mfa.enable("user-123").await.unwrap();

        let code = current_code(&mfa, &setup.secret, &clock);
        assert!(!mfa.validate_code("user-123", &code).await.unwrap());
        assert!(!mfa.validate_code("user-123", &setup.backup_codes[0]).await.unwrap());
        assert_eq!(mfa.backup_codes_remaining("user-123").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_disable_rejects_backup_code() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let mfa = authenticator(&clock);
        let setup = mfa.enable("user-123").await.unwrap();
        mfa.verify("user-123", &current_code(&mfa, &setup.secret, &clock))
            .await
            .unwrap();

        assert!(matches!(
            mfa.disable("user-123", &setup.backup_codes[0]).await,
            Err(AuthGuardError::InvalidCode)
        ));
        assert!(mfa.is_enabled("user-123").await.unwrap());
    }

    #[tokio::test]
    async fn test_backup_code_single_use() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let mfa = authenticator(&clock);
        let setup = mfa.enable("user-123").await.unwrap();
        mfa.verify("user-123", &current_code(&mfa, &setup.secret, &clock))
            .await
            .unwrap();

        for (used, code) in setup.backup_codes.iter().enumerate() {
            assert!(mfa.validate_code("user-123", code).await.unwrap());
            assert!(!mfa.validate_code("user-123", code).await.unwrap());
            assert_eq!(
                mfa.backup_codes_remaining("user-123").await.unwrap(),
                9 - used
            );
        }
    }

    /// Stores a replacement enrollment right before the first activation.
    struct ReenrollingStore {
        inner: InMemoryTwoFactorStore,
        replacement: std::sync::Mutex<Option<TwoFactorRecord>>,
    }

    #[async_trait::async_trait]
    impl TwoFactorStore for ReenrollingStore {
        async fn find(&self, user_id: &str) -> Result<Option<TwoFactorRecord>> {
            self.inner.find(user_id).await
        }

        async fn insert_pending(&self, record: TwoFactorRecord) -> Result<bool> {
            self.inner.insert_pending(record).await
        }

        async fn activate(&self, user_id: &str, record_id: uuid::Uuid, now: DateTime<Utc>) -> Result<bool> {
            let replacement = self.replacement.lock().unwrap().take();
            if let Some(record) = replacement {
                self.inner.insert_pending(record).await?;
            }
            self.inner.activate(user_id, record_id, now).await
        }

        async fn delete(&self, user_id: &str) -> Result<bool> {
            self.inner.delete(user_id).await
        }

        async fn consume_backup_code(&self, user_id: &str, code: &str, now: DateTime<Utc>) -> Result<bool> {
            self.inner.consume_backup_code(user_id, code, now).await
        }
    }

    #[tokio::test]
    async fn test_verify_does_not_activate_replaced_enrollment() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let store = ReenrollingStore {
            inner: InMemoryTwoFactorStore::new(),
            replacement: std::sync::Mutex::new(None),
        };
        let mfa = TwoFactorAuthenticator::new(store, TwoFactorConfig::new("TestApp"))
            .with_clock(clock.shared());

        let setup = mfa.enable("user-123").await.unwrap();
        let code = mfa
            .totp()
            .generate_at(&setup.secret, unix_seconds(clock.now()))
            .unwrap();

        let other_secret = mfa.totp().generate_secret(20);
        *mfa.store().replacement.lock().unwrap() = Some(TwoFactorRecord::pending(
            "user-123",
            other_secret.clone(),
            BackupCodes::new(["11111111"]),
            clock.now(),
        ));

        assert!(matches!(
            mfa.verify("user-123", &code).await,
            Err(AuthGuardError::InvalidCode)
        ));

        let record = mfa.store().find("user-123").await.unwrap().unwrap();
        assert_eq!(record.secret, other_secret);
        assert_eq!(record.status(), TwoFactorStatus::Pending);
        assert!(!record.verified);
    }

    #[tokio::test]
    async fn test_undecodable_secret_rejects_login_code() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let mfa = authenticator(&clock);

        let record = TwoFactorRecord::pending(
            "user-123",
            "not base32!!".to_string(),
            BackupCodes::new(["11111111"]),
            clock.now(),
        );
        mfa.store().insert_pending(record.clone()).await.unwrap();
        mfa.store().activate("user-123", record.id, clock.now()).await.unwrap();

        assert!(!mfa.validate_code("user-123", "123456").await.unwrap());

        // Backup codes still work
        assert!(mfa.validate_code("user-123", "11111111").await.unwrap());
    }
}

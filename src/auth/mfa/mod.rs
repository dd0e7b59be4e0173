//! Two-factor authentication.
//!
//! Provides TOTP (Time-based One-Time Password) codes and single-use backup
//! codes behind a [`TwoFactorAuthenticator`].
//!
//! # Example
//!
//! ```rust,ignore
//! use authguard::auth::mfa::{InMemoryTwoFactorStore, TwoFactorAuthenticator, TwoFactorConfig};
//!
//! let mfa = TwoFactorAuthenticator::new(InMemoryTwoFactorStore::new(), TwoFactorConfig::new("MyApp"));
//!
//! // Start enrollment and show the QR code and backup codes once
//! let setup = mfa.enable("user-123").await?;
//! println!("Scan: {}", setup.provisioning_uri);
//! println!("Save these codes: {:?}", setup.backup_codes);
//! ```

mod backup;
mod config;
mod in_memory;
mod manager;
mod storage;
mod totp;

pub use backup::{BackupCodeGenerator, BackupCodes};
pub use config::{MIN_SECRET_BYTES, TwoFactorConfig};
pub use in_memory::InMemoryTwoFactorStore;
pub use manager::{TwoFactorAuthenticator, TwoFactorSetup};
pub use storage::{TwoFactorRecord, TwoFactorStatus, TwoFactorStore};
pub use totp::{TOTP_DIGITS, TOTP_SKEW, TOTP_STEP, TotpManager};

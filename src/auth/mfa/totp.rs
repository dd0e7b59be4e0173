//! TOTP (Time-based One-Time Password) support.
//!
//! RFC 6238 with HMAC-SHA1, a 30 second step and 6 digit codes. Only the
//! step containing the verification time is accepted; there is no tolerance
//! for clock drift between client and server.

use crate::auth::mfa::config::MIN_SECRET_BYTES;
use crate::error::{AuthGuardError, Result};
use totp_rs::{Algorithm, Secret, TOTP};

/// Digits per code.
pub const TOTP_DIGITS: usize = 6;
/// Time step in seconds.
pub const TOTP_STEP: u64 = 30;
/// Accepted steps before and after the current one.
pub const TOTP_SKEW: u8 = 0;

/// Generates and checks TOTP codes for Base32-encoded secrets.
#[derive(Clone, Debug)]
pub struct TotpManager {
    issuer: String,
}

impl TotpManager {
    /// Create a manager whose provisioning URIs carry `issuer`.
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    /// Generate a new random secret of at least 20 bytes, Base32 encoded
    /// without padding.
    pub fn generate_secret(&self, bytes: usize) -> String {
        use rand::RngCore;
        let mut raw = vec![0u8; bytes.max(MIN_SECRET_BYTES)];
        rand::rngs::OsRng.fill_bytes(&mut raw);
        Secret::Raw(raw).to_encoded().to_string()
    }

    /// The code for the step containing unix time `time`.
    pub fn generate_at(&self, secret: &str, time: u64) -> Result<String> {
        Ok(self.build_totp(secret, "")?.generate(time))
    }

    /// Check `code` against the step containing unix time `time`.
    ///
    /// Surrounding whitespace is ignored.
    pub fn verify_at(&self, secret: &str, code: &str, time: u64) -> Result<bool> {
        let code = code.trim();
        if code.len() != TOTP_DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(false);
        }
        Ok(self.build_totp(secret, "")?.check(code, time))
    }

    /// `otpauth://totp/...` URI for enrolling an authenticator app.
    pub fn provisioning_uri(&self, secret: &str, account_name: &str) -> Result<String> {
        Ok(self.build_totp(secret, account_name)?.get_url())
    }

    fn build_totp(&self, secret: &str, account_name: &str) -> Result<TOTP> {
        let secret = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|e| AuthGuardError::internal(format!("Invalid TOTP secret: {:?}", e)))?;

        Ok(TOTP::new_unchecked(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP,
            secret,
            Some(self.issuer.clone()),
            account_name.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Base32 of the ASCII secret "12345678901234567890" from RFC 6238 appendix B
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn manager() -> TotpManager {
        TotpManager::new("TestApp")
    }

    #[test]
    fn test_rfc6238_vectors() {
        let totp = manager();
        // The RFC lists 8-digit codes; 6-digit codes are their last six digits
        let vectors = [
            (59, "287082"),
            (1_111_111_109, "081804"),
            (1_111_111_111, "050471"),
            (1_234_567_890, "005924"),
            (2_000_000_000, "279037"),
            (20_000_000_000, "353130"),
        ];
        for (time, expected) in vectors {
            assert_eq!(totp.generate_at(RFC_SECRET, time).unwrap(), expected, "t={}", time);
            assert!(totp.verify_at(RFC_SECRET, expected, time).unwrap());
        }
    }

    #[test]
    fn test_only_current_step_accepted() {
        let totp = manager();
        let time = 1_234_567_890;
        let code = totp.generate_at(RFC_SECRET, time).unwrap();

        let step_start = time - time % TOTP_STEP;
        assert!(totp.verify_at(RFC_SECRET, &code, step_start).unwrap());
        assert!(totp.verify_at(RFC_SECRET, &code, step_start + TOTP_STEP - 1).unwrap());

        assert!(!totp.verify_at(RFC_SECRET, &code, step_start - TOTP_STEP).unwrap());
        assert!(!totp.verify_at(RFC_SECRET, &code, step_start + TOTP_STEP).unwrap());
    }

    #[test]
    fn test_whitespace_trimmed() {
        let totp = manager();
        assert!(totp.verify_at(RFC_SECRET, " 287082\n", 59).unwrap());
        assert!(!totp.verify_at(RFC_SECRET, "287 082", 59).unwrap());
        assert!(!totp.verify_at(RFC_SECRET, "28708", 59).unwrap());
        assert!(!totp.verify_at(RFC_SECRET, "abcdef", 59).unwrap());
    }

    #[test]
    fn test_generated_secret() {
        let totp = manager();
        let secret = totp.generate_secret(20);
        // 20 bytes -> 32 Base32 characters, no padding
        assert_eq!(secret.len(), 32);
        assert!(!secret.contains('='));
        assert_ne!(secret, totp.generate_secret(20));

        // Shorter requests are raised to the minimum
        assert_eq!(totp.generate_secret(10).len(), 32);

        let code = totp.generate_at(&secret, 1_000).unwrap();
        assert!(totp.verify_at(&secret, &code, 1_000).unwrap());
    }

    #[test]
    fn test_provisioning_uri() {
        let totp = manager();
        let uri = totp.provisioning_uri(RFC_SECRET, "user-123").unwrap();
        assert!(uri.starts_with("otpauth://totp/"));
        assert!(uri.contains(&format!("secret={}", RFC_SECRET)));
        assert!(uri.contains("issuer=TestApp"));
    }

    #[test]
    fn test_invalid_secret() {
        assert!(manager().generate_at("not base32!", 0).is_err());
    }
}

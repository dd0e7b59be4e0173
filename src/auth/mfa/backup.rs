//! Backup codes for account recovery.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use subtle::ConstantTimeEq;

/// A user's single-use backup codes, each with a used flag.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupCodes {
    codes: BTreeMap<String, bool>,
}

impl BackupCodes {
    /// Track the given codes, all unused.
    pub fn new<I, C>(codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(|c| (c.into(), false)).collect(),
        }
    }

    /// Mark `code` used if it matches an unused code.
    ///
    /// Every stored code is compared in constant time, so the time taken does
    /// not reveal which code (if any) matched. Surrounding whitespace is
    /// ignored.
    pub fn consume(&mut self, code: &str) -> bool {
        let code = code.trim().as_bytes();

        let mut matched: Option<&String> = None;
        for candidate in self.codes.keys() {
            if bool::from(candidate.as_bytes().ct_eq(code)) {
                matched = Some(candidate);
            }
        }

        let Some(key) = matched.cloned() else {
            return false;
        };
        match self.codes.get_mut(&key) {
            Some(used) if !*used => {
                *used = true;
                true
            }
            _ => false,
        }
    }

    /// Number of codes not used yet.
    pub fn remaining(&self) -> usize {
        self.codes.values().filter(|used| !**used).count()
    }

    /// Total number of codes, used or not.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

// Codes are credentials; only counts are printed.
impl std::fmt::Debug for BackupCodes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupCodes")
            .field("total", &self.len())
            .field("remaining", &self.remaining())
            .finish()
    }
}

/// Generates cryptographically secure numeric backup codes.
#[derive(Clone, Debug)]
pub struct BackupCodeGenerator {
    /// Number of codes to generate (default: 10).
    pub count: usize,
    /// Digits per code, zero padded (default: 8).
    pub digits: u32,
}

impl Default for BackupCodeGenerator {
    fn default() -> Self {
        Self {
            count: 10,
            digits: 8,
        }
    }
}

impl BackupCodeGenerator {
    /// Create a new backup code generator with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of codes to generate.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Set the digits per code.
    pub fn with_digits(mut self, digits: u32) -> Self {
        self.digits = digits;
        self
    }

    /// Generate `count` distinct codes.
    ///
    /// Never returns more codes than `digits` can represent.
    pub fn generate(&self) -> Vec<String> {
        use rand::Rng;

        let digits = self.digits.clamp(1, 18);
        let upper = 10u64.pow(digits);
        let width = digits as usize;
        let count = self.count.min(usize::try_from(upper).unwrap_or(usize::MAX));

        let mut rng = rand::rngs::OsRng;
        let mut seen = BTreeSet::new();
        let mut codes = Vec::with_capacity(count);
        while codes.len() < count {
            let code = format!("{:0width$}", rng.gen_range(0..upper), width = width);
            if seen.insert(code.clone()) {
                codes.push(code);
            }
        }
        codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_codes() {
        let codes = BackupCodeGenerator::new().generate();

        assert_eq!(codes.len(), 10);
        assert!(codes.iter().all(|c| c.len() == 8));
        assert!(codes.iter().all(|c| c.bytes().all(|b| b.is_ascii_digit())));

        let distinct: BTreeSet<_> = codes.iter().collect();
        assert_eq!(distinct.len(), 10);
    }

    #[test]
    fn test_custom_settings() {
        let codes = BackupCodeGenerator::new().with_count(5).with_digits(10).generate();

        assert_eq!(codes.len(), 5);
        assert!(codes.iter().all(|c| c.len() == 10));
    }

    #[test]
    fn test_leading_zeros_kept() {
        // With one digit and ten codes every value 0..=9 appears once
        let mut codes = BackupCodeGenerator::new().with_digits(1).generate();
        codes.sort();
        assert_eq!(codes, vec!["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"]);
    }

    #[test]
    fn test_consume_once() {
        let mut codes = BackupCodes::new(["12345678", "87654321"]);
        assert_eq!(codes.remaining(), 2);

        assert!(codes.consume("12345678"));
        assert_eq!(codes.remaining(), 1);
        assert!(!codes.consume("12345678"));

        assert!(codes.consume(" 87654321 "));
        assert_eq!(codes.remaining(), 0);
        assert_eq!(codes.len(), 2);
    }

    #[test]
    fn test_unknown_code() {
        let mut codes = BackupCodes::new(["12345678"]);
        assert!(!codes.consume("00000000"));
        assert!(!codes.consume("1234567"));
        assert!(!codes.consume(""));
        assert_eq!(codes.remaining(), 1);
    }

    #[test]
    fn test_debug_hides_codes() {
        let codes = BackupCodes::new(["12345678"]);
        let debug = format!("{:?}", codes);
        assert!(!debug.contains("12345678"));
        assert!(debug.contains("remaining"));
    }
}

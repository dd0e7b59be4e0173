/// Get environment variable with AUTHGUARD_ prefix, falling back to unprefixed version
///
/// This helper function checks for `AUTHGUARD_{key}` first, then falls back to `{key}`
/// for compatibility with standard environment variable naming.
///
/// # Examples
///
/// ```rust
/// use authguard::utils::get_env_with_prefix;
///
/// // Checks AUTHGUARD_LOG_LEVEL first, then LOG_LEVEL
/// let level = get_env_with_prefix("LOG_LEVEL");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("AUTHGUARD_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse an environment value, keeping `current` when unset or unparsable.
pub(crate) fn parse_env_or<T: std::str::FromStr>(key: &str, current: T) -> T {
    get_env_with_prefix(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        // Test with AUTHGUARD_ prefix
        unsafe {
            std::env::set_var("AUTHGUARD_ENV_TEST_VAR", "prefixed_value");
        }
        assert_eq!(
            get_env_with_prefix("ENV_TEST_VAR"),
            Some("prefixed_value".to_string())
        );
        unsafe {
            std::env::remove_var("AUTHGUARD_ENV_TEST_VAR");
        }

        // Test with unprefixed fallback
        unsafe {
            std::env::set_var("ENV_FALLBACK_VAR", "unprefixed_value");
        }
        assert_eq!(
            get_env_with_prefix("ENV_FALLBACK_VAR"),
            Some("unprefixed_value".to_string())
        );
        unsafe {
            std::env::remove_var("ENV_FALLBACK_VAR");
        }

        // Test non-existent variable
        assert_eq!(get_env_with_prefix("ENV_NON_EXISTENT_VAR"), None);
    }

    #[test]
    fn test_parse_env_or_keeps_current_on_garbage() {
        unsafe {
            std::env::set_var("AUTHGUARD_ENV_PARSE_VAR", "not-a-number");
        }
        assert_eq!(parse_env_or("ENV_PARSE_VAR", 7u64), 7);
        unsafe {
            std::env::set_var("AUTHGUARD_ENV_PARSE_VAR", " 12 ");
        }
        assert_eq!(parse_env_or("ENV_PARSE_VAR", 7u64), 12);
        unsafe {
            std::env::remove_var("AUTHGUARD_ENV_PARSE_VAR");
        }
    }
}

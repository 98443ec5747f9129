/// Get environment variable with COURSEFEED_ prefix, falling back to unprefixed version
///
/// Checks `COURSEFEED_{key}` first, then `{key}`, so deployments can either
/// namespace their variables or reuse the conventional names (`SMTP_HOST`,
/// `REDIS_URL`, ...).
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("COURSEFEED_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse an environment variable, ignoring values that fail to parse
pub fn parse_env_with_prefix<T: std::str::FromStr>(key: &str) -> Option<T> {
    get_env_with_prefix(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        unsafe {
            std::env::set_var("COURSEFEED_TEST_VAR", "prefixed_value");
        }
        assert_eq!(get_env_with_prefix("TEST_VAR"), Some("prefixed_value".to_string()));
        unsafe {
            std::env::remove_var("COURSEFEED_TEST_VAR");
        }

        unsafe {
            std::env::set_var("CF_FALLBACK_VAR", "unprefixed_value");
        }
        assert_eq!(get_env_with_prefix("CF_FALLBACK_VAR"), Some("unprefixed_value".to_string()));
        unsafe {
            std::env::remove_var("CF_FALLBACK_VAR");
        }

        assert_eq!(get_env_with_prefix("CF_NON_EXISTENT_VAR"), None);
    }

    #[test]
    fn test_parse_env_with_prefix_ignores_garbage() {
        unsafe {
            std::env::set_var("COURSEFEED_PARSE_TEST", "not-a-number");
        }
        assert_eq!(parse_env_with_prefix::<u32>("PARSE_TEST"), None);
        unsafe {
            std::env::set_var("COURSEFEED_PARSE_TEST", "42");
        }
        assert_eq!(parse_env_with_prefix::<u32>("PARSE_TEST"), Some(42));
        unsafe {
            std::env::remove_var("COURSEFEED_PARSE_TEST");
        }
    }
}

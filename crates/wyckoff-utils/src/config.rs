//! Environment configuration helpers
//!
//! Every `from_env()` constructor in the workspace reads its settings through
//! these functions so that blank values are treated the same as unset ones.

use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading configuration from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    /// A required variable is unset or blank
    #[error("{0} environment variable not set")]
    Missing(String),

    /// A variable is set but cannot be parsed
    #[error("invalid value for {name}: '{value}' ({detail})")]
    Invalid {
        name: String,
        value: String,
        detail: String,
    },
}

/// Load a `.env` file from the working directory if one exists
///
/// Returns the path that was loaded. Variables already present in the
/// process environment are not overwritten.
pub fn load_dotenv() -> Option<std::path::PathBuf> {
    dotenvy::dotenv().ok()
}

/// Read a variable, treating blank values as unset
pub fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a variable or fall back to a default
pub fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

/// Read and parse a variable; `Ok(None)` when unset
pub fn env_parse<T>(name: &str) -> Result<Option<T>, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(name) {
        None => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|e: T::Err| EnvError::Invalid {
            name: name.to_string(),
            detail: e.to_string(),
            value,
        }),
    }
}

/// Read a boolean flag (`1`, `true`, `yes`, `on` are true)
pub fn env_flag(name: &str) -> bool {
    env_opt(name).is_some_and(|v| {
        matches!(
            v.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_is_unset() {
        // SAFETY: test-local variable name, not read concurrently elsewhere
        unsafe {
            std::env::set_var("WYCKOFF_UTILS_TEST_BLANK", "   ");
        }
        assert_eq!(env_opt("WYCKOFF_UTILS_TEST_BLANK"), None);
        assert_eq!(env_or("WYCKOFF_UTILS_TEST_BLANK", "x"), "x");
        unsafe {
            std::env::remove_var("WYCKOFF_UTILS_TEST_BLANK");
        }
    }

    #[test]
    fn test_env_parse() {
        unsafe {
            std::env::set_var("WYCKOFF_UTILS_TEST_NUM", "42");
            std::env::set_var("WYCKOFF_UTILS_TEST_BAD", "forty");
        }
        assert_eq!(env_parse::<u32>("WYCKOFF_UTILS_TEST_NUM"), Ok(Some(42)));
        assert_eq!(env_parse::<u32>("WYCKOFF_UTILS_TEST_UNSET_XYZ"), Ok(None));
        assert!(matches!(
            env_parse::<u32>("WYCKOFF_UTILS_TEST_BAD"),
            Err(EnvError::Invalid { .. })
        ));
        unsafe {
            std::env::remove_var("WYCKOFF_UTILS_TEST_NUM");
            std::env::remove_var("WYCKOFF_UTILS_TEST_BAD");
        }
    }

    #[test]
    fn test_env_flag() {
        unsafe {
            std::env::set_var("WYCKOFF_UTILS_TEST_FLAG", "Yes");
        }
        assert!(env_flag("WYCKOFF_UTILS_TEST_FLAG"));
        assert!(!env_flag("WYCKOFF_UTILS_TEST_FLAG_UNSET"));
        unsafe {
            std::env::remove_var("WYCKOFF_UTILS_TEST_FLAG");
        }
    }
}

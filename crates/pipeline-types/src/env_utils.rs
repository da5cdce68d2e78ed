//! Environment-variable overrides.
//!
//! Configuration is layered: defaults, then an optional JSON file, then the
//! process environment. These helpers implement the last layer. Every helper
//! returns `None` when the variable is unset, blank, or unparseable, so callers
//! can write `if let Some(v) = env_parse(..) { cfg.field = v }` and leave the
//! lower layers untouched otherwise.
//!
//! ```
//! use class_pipeline_types::env_utils::{env_parse, env_list};
//!
//! let threshold: u32 = env_parse("CLASS_PIPELINE_DOC_THRESHOLD").unwrap_or(132);
//! let extra: Vec<String> = env_list("CLASS_PIPELINE_DOC_EXCLUDE").unwrap_or_default();
//! # assert_eq!(threshold, 132);
//! # assert!(extra.is_empty());
//! ```

use std::str::FromStr;

/// Read a variable as a trimmed, non-empty string.
pub fn env_string(key: &str) -> Option<String> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a variable into any `FromStr` type.
pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

/// Split a comma-separated variable, dropping blank items.
///
/// Returns `None` when the variable is unset so that an unset list and an
/// explicitly empty list (`KEY=","`) can be told apart.
pub fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = std::env::var(key).ok()?;
    Some(
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_string_trims_and_skips_blank() {
        std::env::set_var("CP_TEST_STRING", "  org.example.Proxy ");
        std::env::set_var("CP_TEST_BLANK", "   ");
        assert_eq!(
            env_string("CP_TEST_STRING").as_deref(),
            Some("org.example.Proxy")
        );
        assert_eq!(env_string("CP_TEST_BLANK"), None);
        assert_eq!(env_string("CP_TEST_UNSET_81723"), None);
        std::env::remove_var("CP_TEST_STRING");
        std::env::remove_var("CP_TEST_BLANK");
    }

    #[test]
    fn test_env_parse() {
        std::env::set_var("CP_TEST_U32", "200");
        std::env::set_var("CP_TEST_BAD_U32", "two hundred");
        assert_eq!(env_parse::<u32>("CP_TEST_U32"), Some(200));
        assert_eq!(env_parse::<u32>("CP_TEST_BAD_U32"), None);
        std::env::remove_var("CP_TEST_U32");
        std::env::remove_var("CP_TEST_BAD_U32");
    }

    #[test]
    fn test_env_list() {
        std::env::set_var("CP_TEST_LIST", "Bar, ,Baz ,");
        std::env::set_var("CP_TEST_LIST_EMPTY", ",");
        assert_eq!(
            env_list("CP_TEST_LIST"),
            Some(vec!["Bar".to_string(), "Baz".to_string()])
        );
        assert_eq!(env_list("CP_TEST_LIST_EMPTY"), Some(vec![]));
        assert_eq!(env_list("CP_TEST_LIST_UNSET_81724"), None);
        std::env::remove_var("CP_TEST_LIST");
        std::env::remove_var("CP_TEST_LIST_EMPTY");
    }
}

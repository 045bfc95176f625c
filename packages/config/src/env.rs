//! Typed environment variable lookups.
//!
//! Every helper has a `*_from` variant that takes a lookup function instead of
//! reading the process environment, which keeps the parsing testable without
//! mutating global state.

use thiserror::Error;

/// Errors produced when an environment variable holds a malformed value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    /// The variable is set but is not a valid unsigned integer.
    #[error("Invalid value for {name}: '{value}' is not a valid number")]
    InvalidNumber {
        /// Variable name.
        name: String,
        /// Raw value.
        value: String,
    },
}

/// Reads a variable from the process environment. Blank values come back
/// as-is; callers pass them through [`non_empty`].
fn lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|x| {
        let trimmed = x.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Returns the value of `name` or `default` when it is unset or empty.
#[must_use]
pub fn default_env(name: &str, default: &str) -> String {
    default_env_from(lookup, name, default)
}

pub(crate) fn default_env_from(
    get: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> String {
    non_empty(get(name)).unwrap_or_else(|| default.to_string())
}

/// # Errors
///
/// * If the variable is set to something that is not a `usize`
pub fn option_env_usize(name: &str) -> Result<Option<usize>, EnvError> {
    option_env_u64_from(lookup, name)?
        .map(|x| {
            usize::try_from(x).map_err(|_| EnvError::InvalidNumber {
                name: name.to_string(),
                value: x.to_string(),
            })
        })
        .transpose()
}

pub(crate) fn option_env_u64_from(
    get: impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<u64>, EnvError> {
    non_empty(get(name))
        .map(|value| {
            value.parse::<u64>().map_err(|_| EnvError::InvalidNumber {
                name: name.to_string(),
                value,
            })
        })
        .transpose()
}

/// # Errors
///
/// * If the variable is set to something that is not a `usize`
pub fn default_env_usize(name: &str, default: usize) -> Result<usize, EnvError> {
    Ok(option_env_usize(name)?.unwrap_or(default))
}

/// # Errors
///
/// * If the variable is set to something that is not a `u64`
pub fn default_env_u64(name: &str, default: u64) -> Result<u64, EnvError> {
    default_env_u64_from(lookup, name, default)
}

pub(crate) fn default_env_u64_from(
    get: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<u64, EnvError> {
    Ok(option_env_u64_from(get, name)?.unwrap_or(default))
}

/// Reads a comma separated list. Items are trimmed and empty items dropped.
#[must_use]
pub fn env_list(name: &str, default: &str) -> Vec<String> {
    env_list_from(lookup, name, default)
}

pub(crate) fn env_list_from(
    get: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> Vec<String> {
    default_env_from(get, name, default)
        .split(',')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn vars(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test_log::test]
    fn default_env_treats_blank_as_unset() {
        let get = vars(&[("BIND_ADDR", "   ")]);

        assert_eq!(default_env_from(get, "BIND_ADDR", "0.0.0.0"), "0.0.0.0");
    }

    #[test_log::test]
    fn option_env_u64_parses_trimmed_values() {
        let get = vars(&[("PORT", " 8080 ")]);

        assert_eq!(option_env_u64_from(get, "PORT"), Ok(Some(8080)));
    }

    #[test_log::test]
    fn option_env_u64_rejects_garbage() {
        let get = vars(&[("PORT", "eighty")]);

        assert_eq!(
            option_env_u64_from(get, "PORT"),
            Err(EnvError::InvalidNumber {
                name: "PORT".to_string(),
                value: "eighty".to_string(),
            })
        );
    }

    #[test_log::test]
    fn env_list_drops_empty_items() {
        let get = vars(&[("ALLOWED_ORIGINS", "http://a, ,http://b,")]);

        assert_eq!(
            env_list_from(get, "ALLOWED_ORIGINS", ""),
            vec!["http://a".to_string(), "http://b".to_string()]
        );
    }

    #[test_log::test]
    fn lookup_leaves_blank_handling_to_callers() {
        assert_eq!(lookup("BOOXCLASH_TEST_NEVER_SET"), None);
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some(" x ".to_string())), Some("x".to_string()));
    }
}

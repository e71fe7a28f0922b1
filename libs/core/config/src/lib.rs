pub mod tracing;

use std::env::{self, VarError};
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

/// Runtime environment of the dispatcher.
///
/// Selects the log format: JSON for production, pretty output otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Read `APP_ENV`. Anything other than "production" is development.
    pub fn from_env() -> Self {
        match env::var("APP_ENV") {
            Ok(value) if value.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// Value of `key`, treating unset and empty the same.
///
/// A value that is not valid unicode is an error rather than unset.
pub fn env_optional(key: &str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(ConfigError::ParseError {
            key: key.to_string(),
            details: "value is not valid unicode".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_defaults_to_development() {
        temp_env::with_var_unset("APP_ENV", || {
            let env = Environment::from_env();
            assert_eq!(env, Environment::Development);
            assert!(env.is_development());
            assert!(!env.is_production());
        });
    }

    #[test]
    fn test_environment_production_case_insensitive() {
        for value in ["production", "PRODUCTION", "Production"] {
            temp_env::with_var("APP_ENV", Some(value), || {
                assert_eq!(Environment::from_env(), Environment::Production);
            });
        }
    }

    #[test]
    fn test_environment_unknown_defaults_to_development() {
        temp_env::with_var("APP_ENV", Some("staging"), || {
            assert_eq!(Environment::from_env(), Environment::Development);
        });
    }

    #[test]
    fn test_env_optional_treats_empty_as_unset() {
        temp_env::with_var("DISPATCH_OPTIONAL", Some(""), || {
            assert_eq!(env_optional("DISPATCH_OPTIONAL").unwrap(), None);
        });
        temp_env::with_var("DISPATCH_OPTIONAL", Some("value"), || {
            assert_eq!(
                env_optional("DISPATCH_OPTIONAL").unwrap().as_deref(),
                Some("value")
            );
        });
        temp_env::with_var_unset("DISPATCH_OPTIONAL", || {
            assert_eq!(env_optional("DISPATCH_OPTIONAL").unwrap(), None);
        });
    }

    #[cfg(unix)]
    #[test]
    fn test_env_optional_rejects_non_unicode() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let value = OsStr::from_bytes(&[0x66, 0x80]);
        temp_env::with_var("DISPATCH_OPTIONAL", Some(value), || {
            match env_optional("DISPATCH_OPTIONAL") {
                Err(ConfigError::ParseError { key, details }) => {
                    assert_eq!(key, "DISPATCH_OPTIONAL");
                    assert!(details.contains("unicode"));
                }
                other => panic!("unexpected result: {other:?}"),
            }
        });
    }
}

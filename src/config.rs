//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Production API base URL used when no endpoint is configured.
pub const DEFAULT_ENDPOINT: &str = "https://api.halyard.dev/v1";

const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 300;

/// Halyard configuration derived from environment variables, configuration
/// files, and CLI flags.
#[derive(Clone, Debug, Deserialize, Eq, OrthoConfig, PartialEq)]
#[ortho_config(prefix = "HALYARD")]
pub struct HalyardConfig {
    /// Bearer token used to authenticate against the hosting API. Required.
    pub access_token: String,
    /// Base URL of the hosting API.
    #[ortho_config(default = DEFAULT_ENDPOINT.to_owned())]
    pub endpoint: String,
    /// Initial delay in milliseconds between readiness checks. Defaults to
    /// 1000 when unset.
    pub poll_interval_ms: Option<u64>,
    /// Overall readiness deadline in seconds. Defaults to 300 when unset.
    pub poll_timeout_secs: Option<u64>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl HalyardConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to halyard.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags
    /// in that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("halyard")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields. Error messages
    /// include guidance on how to provide missing values via environment
    /// variables or configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.access_token,
            &FieldMetadata::new("API access token", "HALYARD_ACCESS_TOKEN", "access_token"),
        )?;
        Self::require_field(
            &self.endpoint,
            &FieldMetadata::new("API endpoint", "HALYARD_ENDPOINT", "endpoint"),
        )?;
        Ok(())
    }

    /// Initial delay between readiness checks.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }

    /// Overall readiness deadline.
    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs.unwrap_or(DEFAULT_POLL_TIMEOUT_SECS))
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Eq, Error, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> HalyardConfig {
        HalyardConfig {
            access_token: String::from("tok-123"),
            endpoint: String::from(DEFAULT_ENDPOINT),
            poll_interval_ms: None,
            poll_timeout_secs: None,
        }
    }

    #[test]
    fn validation_accepts_a_complete_configuration() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn missing_token_produces_an_actionable_error() {
        let config = HalyardConfig {
            access_token: String::new(),
            ..valid_config()
        };

        let error = config.validate().expect_err("token is required");
        let ConfigError::MissingField(ref message) = error else {
            panic!("expected MissingField error");
        };
        assert!(message.contains("HALYARD_ACCESS_TOKEN"), "message: {message}");
        assert!(message.contains("halyard.toml"), "message: {message}");
        assert!(message.contains("access_token"), "message: {message}");
    }

    #[test]
    fn poll_settings_fall_back_to_defaults() {
        let config = valid_config();
        assert_eq!(config.poll_interval(), Duration::from_millis(1_000));
        assert_eq!(config.poll_timeout(), Duration::from_secs(300));

        let tuned = HalyardConfig {
            poll_interval_ms: Some(50),
            poll_timeout_secs: Some(5),
            ..valid_config()
        };
        assert_eq!(tuned.poll_interval(), Duration::from_millis(50));
        assert_eq!(tuned.poll_timeout(), Duration::from_secs(5));
    }
}

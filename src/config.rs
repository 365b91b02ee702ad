//! Runtime configuration for the operation core.
//!
//! Values come from built-in defaults, an optional TOML file, and
//! environment overrides of the form `WALLETOPS__<KEY>` (nested keys use
//! `__` as separator, e.g. `WALLETOPS__RETRY__MAX_ATTEMPTS=5`).

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Locale;
use crate::retry::RetryPolicy;
use crate::state::{LoadingMode, DEFAULT_MAX_ERRORS};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "WALLETOPS";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    /// The configuration path is not valid UTF-8.
    #[error("invalid configuration path: {0}")]
    InvalidPath(String),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The configuration could not be rendered as TOML.
    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Automatic retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled for each one after.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Maximum number of errors kept in the store.
    pub max_errors: usize,
    /// Language of user-facing messages.
    pub locale: Locale,
    /// Loading indicator behaviour under overlapping operations.
    pub loading_mode: LoadingMode,
    /// Ledger cluster name, used in explorer links.
    pub network: String,
    /// Base URL of the block explorer.
    pub explorer_url: String,
    /// Deadline for a single ledger request.
    pub request_timeout_ms: u64,
    pub retry: RetryConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_errors: DEFAULT_MAX_ERRORS,
            locale: Locale::default(),
            loading_mode: LoadingMode::default(),
            network: "devnet".to_string(),
            explorer_url: "https://explorer.solana.com".to_string(),
            request_timeout_ms: 30_000,
            retry: RetryConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Loads configuration from an optional file plus `WALLETOPS__*`
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed, or if a value
    /// fails validation.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use walletops::config::CoreConfig;
    ///
    /// let config = CoreConfig::load(Some("walletops.toml"))?;
    /// # Ok::<(), walletops::config::ConfigError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Same as [`load`](Self::load) with a custom environment prefix.
    pub fn load_with_prefix<P: AsRef<Path>>(
        path: Option<P>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            let path = path.as_ref();
            let path_str = path
                .to_str()
                .ok_or_else(|| ConfigError::InvalidPath(format!("{:?}", path)))?;
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path_str.to_string()));
            }
            builder = builder.add_source(File::with_name(path_str));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let core: CoreConfig = config.try_deserialize()?;
        core.validate()?;
        tracing::debug!(?core, "configuration loaded");
        Ok(core)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_errors == 0 {
            return Err(ConfigError::Invalid("max_errors must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be at least 1".into(),
            ));
        }
        if self.explorer_url.trim().is_empty() {
            return Err(ConfigError::Invalid("explorer_url must not be empty".into()));
        }
        Ok(())
    }

    /// Retry policy described by the `retry` section.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.retry.base_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
            self.retry.max_attempts,
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Renders the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.max_errors, 5);
        assert_eq!(config.locale, Locale::En);
        assert_eq!(config.loading_mode, LoadingMode::Counted);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_toml() {
        let config: CoreConfig = toml::from_str(
            r#"
            max_errors = 10
            locale = "ro"
            loading_mode = "flag"

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.max_errors, 10);
        assert_eq!(config.locale, Locale::Ro);
        assert_eq!(config.loading_mode, LoadingMode::Flag);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.network, "devnet");
    }

    #[test]
    fn test_validate_rejects_zero_cap() {
        let config = CoreConfig {
            max_errors: 0,
            ..CoreConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let mut config = CoreConfig::default();
        config.retry.base_delay_ms = 10_000;
        config.retry.max_delay_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = CoreConfig::load(Some("/definitely/not/here/walletops.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = CoreConfig::default().retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_to_toml_roundtrips_through_loader_format() {
        let rendered = CoreConfig::default().to_toml().unwrap();
        assert!(rendered.contains("max_errors = 5"));
        assert!(rendered.contains("[retry]"));
        let parsed: CoreConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, CoreConfig::default());
    }
}

//! Configuration validation rules.
//!
//! Validation runs after loading, over the merged result of defaults, file
//! and environment.

use thiserror::Error;

use crate::config::AppConfig;
use crate::key::normalize;

/// Known resource-class names accepted in `strategy_overrides` keys.
const CLASS_NAMES: &[&str] = &["document", "image", "external-library", "other"];

/// Known strategy names accepted in `strategy_overrides` values.
const STRATEGY_NAMES: &[&str] = &["cache-first", "network-first", "stale-while-revalidate"];

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `version` is empty or contains characters unusable in a partition name
    /// - `origin` is not a valid http(s) URL
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - a `strategy_overrides` key or value is unknown
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.is_empty() {
            return Err(ConfigError::Invalid { field: "version".into(), reason: "must not be empty".into() });
        }
        if self.version.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid { field: "version".into(), reason: "must not contain whitespace".into() });
        }

        if normalize(&self.origin).is_err() {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "must be a valid http(s) URL".into() });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        for (class, strategy) in &self.strategy_overrides {
            if !CLASS_NAMES.contains(&class.as_str()) {
                return Err(ConfigError::Invalid {
                    field: "strategy_overrides".into(),
                    reason: format!("unknown resource class: {class}"),
                });
            }
            if !STRATEGY_NAMES.contains(&strategy.as_str()) {
                return Err(ConfigError::Invalid {
                    field: "strategy_overrides".into(),
                    reason: format!("unknown strategy: {strategy}"),
                });
            }
        }

        if self.core_paths.is_empty() {
            tracing::warn!("core_paths is empty; install will pre-cache nothing");
        }

        Ok(())
    }
}

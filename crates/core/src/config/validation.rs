//! Configuration validation rules.
//!
//! Checks `WorkerConfig` values after they have been loaded from
//! environment, files, or defaults.

use crate::config::WorkerConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl WorkerConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `partition_version` is empty or contains whitespace
    /// - `scope` is not an absolute http(s) URL
    /// - a `seed_list` entry is empty, does not resolve against `scope`, or
    ///   resolves to a non-http(s) URL
    /// - a bypass or revalidate pattern is empty
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    ///
    /// Returns `ConfigError::Missing` if `seed_list` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partition_version.is_empty() {
            return Err(ConfigError::Invalid { field: "partition_version".into(), reason: "must not be empty".into() });
        }
        if self.partition_version.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "partition_version".into(),
                reason: "must not contain whitespace".into(),
            });
        }

        let scope = self.scope_url()?;
        if !matches!(scope.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "scope".into(),
                reason: format!("unsupported scheme: {}", scope.scheme()),
            });
        }

        if self.seed_list.is_empty() {
            return Err(ConfigError::Missing {
                field: "seed_list".into(),
                hint: "Set SWPROXY_SEED_LIST or seed_list in the config file".into(),
            });
        }
        for seed in &self.seed_list {
            let invalid = |reason: String| ConfigError::Invalid { field: "seed_list".into(), reason };
            if seed.trim().is_empty() {
                return Err(invalid("seed entries must not be empty".into()));
            }
            let url = scope.join(seed.trim()).map_err(|e| invalid(format!("{seed}: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(invalid(format!("{seed}: unsupported scheme {}", url.scheme())));
            }
        }

        for (field, patterns) in [("bypass_patterns", &self.bypass_patterns), ("revalidate_patterns", &self.revalidate_patterns)] {
            if patterns.iter().any(|p| p.trim().is_empty()) {
                return Err(ConfigError::Invalid { field: field.into(), reason: "patterns must not be empty".into() });
            }
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

        let overlap = self.bypass_patterns.iter().filter(|p| self.revalidate_patterns.contains(p)).count();
        if overlap > 0 {
            tracing::warn!(
                overlap,
                "Some patterns are listed as both bypass and revalidate; \
                 bypass takes precedence"
            );
        }

        Ok(())
    }
}

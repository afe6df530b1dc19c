//! Configuration validation rules.
//!
//! Applied to `AppConfig` after every source has been merged.

use crate::config::AppConfig;
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

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `per_page` is outside 1..=100
    /// - `cap_max`, `window_size` or `idle_timeout_ms` is 0
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `hover_debounce_ms` exceeds 10 seconds
    /// - `user_agent` or `api_base_url` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.per_page) {
            return Err(invalid("per_page", "must be between 1 and 100"));
        }
        if self.cap_max == 0 {
            return Err(invalid("cap_max", "must be greater than 0"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(invalid("api_base_url", "must not be empty"));
        }

        if self.window_size == 0 {
            return Err(invalid("window_size", "must be greater than 0"));
        }
        if self.idle_timeout_ms == 0 {
            return Err(invalid("idle_timeout_ms", "must be greater than 0"));
        }
        if self.hover_debounce_ms > 10_000 {
            return Err(invalid("hover_debounce_ms", "must not exceed 10 seconds (10000ms)"));
        }

        if self.stale_time_ms > self.gc_time_ms {
            tracing::warn!(
                stale_time_ms = self.stale_time_ms,
                gc_time_ms = self.gc_time_ms,
                "stale_time_ms exceeds gc_time_ms; entries are purged before they go stale"
            );
        }

        Ok(())
    }
}

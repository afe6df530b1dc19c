//! Application configuration with layered loading.
//!
//! Sources, highest precedence first:
//!
//! 1. Environment variables (LOOKAHEAD_*)
//! 2. TOML config file (if LOOKAHEAD_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::StoreOptions;
use crate::key::PER_PAGE_DEFAULT;
use crate::pager::CAP_MAX_DEFAULT;
use crate::prefetch::PrefetchOptions;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// GitHub token sent as a bearer credential.
    ///
    /// Set via LOOKAHEAD_GITHUB_TOKEN environment variable. Issues, code and
    /// commit search refuse to run without it.
    #[serde(default)]
    pub github_token: Option<String>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Value of the X-GitHub-Api-Version header.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Minimum spacing between two outgoing search requests.
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Largest result window the search service paginates through.
    #[serde(default = "default_cap_max")]
    pub cap_max: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    #[serde(default = "default_hover_debounce_ms")]
    pub hover_debounce_ms: u64,

    #[serde(default = "default_true")]
    pub enable_idle_prefetch: bool,

    #[serde(default = "default_true")]
    pub enable_hover_prefetch: bool,

    /// Age after which a cached page is refetched on the next request.
    #[serde(default = "default_stale_time_ms")]
    pub stale_time_ms: u64,

    /// Age after which a cached page is dropped.
    #[serde(default = "default_gc_time_ms")]
    pub gc_time_ms: u64,

    /// Number of page links shown around the current page.
    #[serde(default = "default_window_size")]
    pub window_size: u32,

    /// Quiet period before typed query input is submitted.
    #[serde(default = "default_input_debounce_ms")]
    pub input_debounce_ms: u64,
}

fn default_api_base_url() -> String {
    "https://api.github.com".into()
}

fn default_api_version() -> String {
    "2022-11-28".into()
}

fn default_user_agent() -> String {
    concat!("lookahead/", env!("CARGO_PKG_VERSION")).into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_min_request_interval_ms() -> u64 {
    2_000
}

fn default_per_page() -> u32 {
    PER_PAGE_DEFAULT
}

fn default_cap_max() -> u64 {
    CAP_MAX_DEFAULT
}

fn default_idle_timeout_ms() -> u64 {
    1_500
}

fn default_hover_debounce_ms() -> u64 {
    150
}

fn default_stale_time_ms() -> u64 {
    5_000
}

fn default_gc_time_ms() -> u64 {
    120_000
}

fn default_window_size() -> u32 {
    5
}

fn default_input_debounce_ms() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            api_base_url: default_api_base_url(),
            api_version: default_api_version(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            min_request_interval_ms: default_min_request_interval_ms(),
            per_page: default_per_page(),
            cap_max: default_cap_max(),
            idle_timeout_ms: default_idle_timeout_ms(),
            hover_debounce_ms: default_hover_debounce_ms(),
            enable_idle_prefetch: true,
            enable_hover_prefetch: true,
            stale_time_ms: default_stale_time_ms(),
            gc_time_ms: default_gc_time_ms(),
            window_size: default_window_size(),
            input_debounce_ms: default_input_debounce_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn input_debounce(&self) -> Duration {
        Duration::from_millis(self.input_debounce_ms)
    }

    pub fn prefetch_options(&self) -> PrefetchOptions {
        PrefetchOptions {
            cap_max: self.cap_max,
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            hover_debounce: Duration::from_millis(self.hover_debounce_ms),
            enable_idle_prefetch: self.enable_idle_prefetch,
            enable_hover_prefetch: self.enable_hover_prefetch,
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            stale_time: Duration::from_millis(self.stale_time_ms),
            gc_time: Duration::from_millis(self.gc_time_ms),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("LOOKAHEAD_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("LOOKAHEAD_")
                .ignore(&["config_file", "log_json"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Token for endpoints that refuse anonymous access.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no token is configured.
    pub fn require_github_token(&self) -> Result<&str, ConfigError> {
        self.github_token.as_deref().filter(|t| !t.trim().is_empty()).ok_or_else(|| ConfigError::Missing {
            field: "github_token".into(),
            hint: "Set LOOKAHEAD_GITHUB_TOKEN environment variable".into(),
        })
    }
}

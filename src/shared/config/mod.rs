//! Application configuration module
//!
//! Provides the validated configuration for the synchronization core, built
//! either programmatically through [`AppConfigBuilder`] or from a TOML file.
//!
//! ```toml
//! server_url = "https://routes.example.com"
//! database_path = "/var/lib/route-sync/local.db"
//! settle_delay_ms = 2000
//! poll_interval_secs = 30
//! bad_request_policy = "applied"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default server URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Delay between an "online" signal and the reconciliation it triggers
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Interval of the pending-work poll while online
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Per-request deadline for replayed mutations
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Consecutive transient failures after which an item is dropped
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// How a replayed mutation answered with HTTP 400 is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadRequestPolicy {
    /// The server already reflects the intended state; clear the item silently
    #[default]
    Applied,
    /// The mutation can never succeed; clear the item and report it as rejected
    Rejected,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the remote API
    pub server_url: Option<String>,
    /// SQLite file for the primary store; `None` keeps it in memory
    pub database_path: Option<PathBuf>,
    /// JSON file for the fallback key-value store; `None` keeps it in memory
    pub fallback_path: Option<PathBuf>,
    /// Delay before reconciling after reconnecting
    pub settle_delay: Duration,
    /// Pending-work poll interval
    pub poll_interval: Duration,
    /// Deadline for a single remote call
    pub request_timeout: Duration,
    /// Transient failures tolerated per queue item
    pub max_retries: u32,
    /// Statuses treated as "already applied"
    pub conflict_statuses: Vec<u16>,
    /// Treatment of HTTP 400
    pub bad_request_policy: BadRequestPolicy,
    /// Bearer token sent with every remote call
    pub auth_token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            database_path: None,
            fallback_path: None,
            settle_delay: DEFAULT_SETTLE_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            conflict_statuses: vec![400, 409],
            bad_request_policy: BadRequestPolicy::default(),
            auth_token: None,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse a TOML document; every key is optional
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        file.into_builder().build()
    }

    /// Read and parse a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Server URL with the default applied
    pub fn server_url(&self) -> &str {
        self.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.server_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }
        if self.request_timeout < MIN_REQUEST_TIMEOUT || self.request_timeout > MAX_REQUEST_TIMEOUT
        {
            return Err(ConfigError::InvalidDuration {
                field: "request_timeout",
                value: self.request_timeout,
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidDuration {
                field: "poll_interval",
                value: self.poll_interval,
            });
        }
        if self.max_retries == 0 {
            return Err(ConfigError::MissingValue("max_retries"));
        }
        Ok(())
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Set the SQLite file path
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = Some(path.into());
        self
    }

    /// Set the fallback store file path
    pub fn fallback_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.fallback_path = Some(path.into());
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn conflict_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.config.conflict_statuses = statuses;
        self
    }

    pub fn bad_request_policy(mut self, policy: BadRequestPolicy) -> Self {
        self.config.bad_request_policy = policy;
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth_token = Some(token.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// On-disk configuration layout
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    server_url: Option<String>,
    database_path: Option<PathBuf>,
    fallback_path: Option<PathBuf>,
    settle_delay_ms: Option<u64>,
    poll_interval_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    conflict_statuses: Option<Vec<u16>>,
    bad_request_policy: Option<BadRequestPolicy>,
    auth_token: Option<String>,
}

impl ConfigFile {
    fn into_builder(self) -> AppConfigBuilder {
        let mut builder = AppConfig::builder();
        if let Some(url) = self.server_url {
            builder = builder.server_url(url);
        }
        if let Some(path) = self.database_path {
            builder = builder.database_path(path);
        }
        if let Some(path) = self.fallback_path {
            builder = builder.fallback_path(path);
        }
        if let Some(ms) = self.settle_delay_ms {
            builder = builder.settle_delay(Duration::from_millis(ms));
        }
        if let Some(secs) = self.poll_interval_secs {
            builder = builder.poll_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.request_timeout_secs {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(retries) = self.max_retries {
            builder = builder.max_retries(retries);
        }
        if let Some(statuses) = self.conflict_statuses {
            builder = builder.conflict_statuses(statuses);
        }
        if let Some(policy) = self.bad_request_policy {
            builder = builder.bad_request_policy(policy);
        }
        if let Some(token) = self.auth_token {
            builder = builder.auth_token(token);
        }
        builder
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration {
        field: &'static str,
        value: Duration,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

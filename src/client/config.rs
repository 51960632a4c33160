//! Client configuration
//!
//! Wraps the shared [`AppConfig`] with what only the device runtime needs:
//! environment overrides, the bearer token and default on-disk locations.

use crate::client::local_db::StoreConfig;
use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};
use std::path::{Path, PathBuf};

/// Overrides `server_url`
pub const ENV_API_URL: &str = "ROUTE_SYNC_API_URL";
/// Overrides `database_path`
pub const ENV_DATABASE: &str = "ROUTE_SYNC_DB";
/// Overrides `auth_token`
pub const ENV_TOKEN: &str = "ROUTE_SYNC_TOKEN";

const APP_DIR: &str = "route-sync";
const DATABASE_FILE: &str = "local.db";
const FALLBACK_FILE: &str = "fallback.json";

/// Application configuration wrapper.
#[derive(Debug, Clone, Default)]
pub struct Config {
    app: AppConfig,
}

impl Config {
    /// Validated configuration, in memory, without environment overrides
    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self {
            app: builder.build()?,
        })
    }

    /// Load from an optional TOML file, apply environment overrides and
    /// place unset store files under the platform data directory
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut app = match path {
            Some(path) => AppConfig::from_toml_file(path)?,
            None => AppConfig::default(),
        };

        apply_env(&mut app, |key| std::env::var(key).ok());

        if let Some(dir) = Self::default_data_dir() {
            if app.database_path.is_none() {
                app.database_path = Some(dir.join(DATABASE_FILE));
            }
            if app.fallback_path.is_none() {
                app.fallback_path = Some(dir.join(FALLBACK_FILE));
            }
        }

        app.validate()?;
        Ok(Self { app })
    }

    /// `<data dir>/route-sync`, when the platform has one
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(APP_DIR))
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    /// Set the bearer token
    pub fn set_token(&mut self, token: Option<String>) {
        self.app.auth_token = token;
    }

    pub fn get_token(&self) -> Option<&str> {
        self.app.auth_token.as_deref()
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url(), path)
    }

    pub fn server_url(&self) -> &str {
        self.app.server_url()
    }

    /// Backend locations for the local store
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            database_path: self.app.database_path.clone(),
            fallback_path: self.app.fallback_path.clone(),
        }
    }
}

fn apply_env(app: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
        app.server_url = Some(url.trim_end_matches('/').to_string());
    }
    if let Some(path) = lookup(ENV_DATABASE).filter(|v| !v.is_empty()) {
        app.database_path = Some(PathBuf::from(path));
    }
    if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.is_empty()) {
        app.auth_token = Some(token);
    }
}

//! Application configuration with layered loading.
//!
//! Sources, highest precedence first:
//!
//! 1. Environment variables (`STUDIO_*`)
//! 2. TOML config file (if `STUDIO_CONFIG_FILE` is set)
//! 3. Built-in defaults

use crate::{AssetError, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the projects REST API.
    ///
    /// Set via STUDIO_API_URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Deployment environment (`development`, `production`, ...).
    ///
    /// Set via STUDIO_ENVIRONMENT.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Directory the persisted video cache is written to.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Maximum age of a cached video entry in milliseconds.
    #[serde(default = "default_max_cache_age_ms")]
    pub max_cache_age_ms: u64,

    /// Leading bytes fetched for a metadata-only video preload.
    #[serde(default = "default_metadata_bytes")]
    pub metadata_bytes: u64,

    /// Whether videos are preloaded in full instead of metadata only.
    #[serde(default)]
    pub full_preload: bool,
}

fn default_api_url() -> String {
    "http://localhost:3006/api".into()
}

fn default_environment() -> String {
    "development".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./.studio-cache")
}

fn default_max_cache_age_ms() -> u64 {
    crate::metadata::DEFAULT_CACHE_AGE.as_millis() as u64
}

fn default_metadata_bytes() -> u64 {
    crate::loader::DEFAULT_METADATA_BYTES
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            environment: default_environment(),
            timeout_ms: default_timeout_ms(),
            cache_dir: default_cache_dir(),
            max_cache_age_ms: default_max_cache_age_ms(),
            metadata_bytes: default_metadata_bytes(),
            full_preload: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AssetError::ConfigError` if a source cannot be read or
    /// parsed, or if validation fails.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("STUDIO_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(Env::prefixed("STUDIO_").ignore(&["config_file"]));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check loaded values.
    pub fn validate(&self) -> Result<()> {
        let api_url = self.api_url.trim();
        if api_url.is_empty() {
            return Err(AssetError::config("api_url must not be empty"));
        }
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(AssetError::config(format!(
                "api_url must be an http(s) URL, got {:?}",
                api_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(AssetError::config("timeout_ms must be greater than 0"));
        }
        if self.metadata_bytes == 0 {
            return Err(AssetError::config("metadata_bytes must be greater than 0"));
        }
        Ok(())
    }

    /// Timeout as Duration for reqwest
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Video cache TTL as Duration
    pub fn max_cache_age(&self) -> Duration {
        Duration::from_millis(self.max_cache_age_ms)
    }

    /// Whether running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Whether running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Join `path` onto the API base URL with exactly one slash between them
    pub fn url(&self, path: &str) -> String {
        let base = self.api_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }
}

//! Application configuration with layered loading.
//!
//! Loading precedence (highest wins):
//! 1. Environment variables (OFFCACHE_*)
//! 2. TOML config file (if OFFCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::manifest::VersionManifest;

mod validation;

pub use validation::ConfigError;

/// Worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite partition store.
    ///
    /// Set via OFFCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Version identifier baked into partition names.
    ///
    /// Set via OFFCACHE_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Origin of the hosting application.
    ///
    /// Set via OFFCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Core app shell paths pre-cached on install.
    #[serde(default = "default_core_paths")]
    pub core_paths: Vec<String>,

    /// Third-party URLs pre-cached on install and refreshed by background
    /// sync.
    #[serde(default)]
    pub external_urls: Vec<String>,

    /// Allowlisted third-party library hosts.
    #[serde(default)]
    pub external_hosts: Vec<String>,

    /// Path of the navigation fallback document.
    #[serde(default = "default_root_document")]
    pub root_document: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via OFFCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Per-class strategy overrides, e.g. `external-library =
    /// "stale-while-revalidate"`. Keys are resource classes, values are
    /// strategy names; unknown values are rejected at validation.
    #[serde(default)]
    pub strategy_overrides: BTreeMap<String, String>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offcache.sqlite")
}

fn default_version() -> String {
    "v1.0".into()
}

fn default_origin() -> String {
    "http://localhost:8000".into()
}

fn default_core_paths() -> Vec<String> {
    vec!["/".into(), "/index.html".into(), "/manifest.json".into()]
}

fn default_root_document() -> String {
    "/index.html".into()
}

fn default_user_agent() -> String {
    "offcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            version: default_version(),
            origin: default_origin(),
            core_paths: default_core_paths(),
            external_urls: Vec::new(),
            external_hosts: Vec::new(),
            root_document: default_root_document(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            strategy_overrides: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be read or validation fails
    /// after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The read-only manifest this configuration describes.
    pub fn manifest(&self) -> VersionManifest {
        VersionManifest {
            version: self.version.clone(),
            origin: self.origin.clone(),
            core_paths: self.core_paths.clone(),
            external_urls: self.external_urls.clone(),
            external_hosts: self.external_hosts.clone(),
            root_document: self.root_document.clone(),
        }
    }
}

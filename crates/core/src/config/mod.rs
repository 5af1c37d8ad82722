//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFSHORE_*)
//! 2. TOML config file (if OFFSHORE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The cache generation identity, install manifest, and tile patterns all
//! live here so that independently configured agent instances can coexist
//! (no module-level mutable state).

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::store::Generation;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFSHORE_*)
/// 2. TOML config file (if OFFSHORE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cache generation name. Together with `cache_version` it identifies
    /// the one generation this agent treats as active.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Cache generation version. Bumping it invalidates every previously
    /// stored generation on the next activation.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin of the application the agent controls. Manifest entries given
    /// as absolute paths are resolved against it.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Install manifest: every entry is fetched and stored at install time,
    /// and any single failure aborts the whole install.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Marker substrings that classify a URL as a core file even when it is
    /// not in the manifest (UI library, geodata extension, app manifest).
    #[serde(default = "default_core_markers")]
    pub core_markers: Vec<String>,

    /// Regex patterns describing known tile-server URL shapes. Adding a new
    /// tile provider means adding a pattern here.
    #[serde(default = "default_tile_patterns")]
    pub tile_patterns: Vec<String>,

    /// Path served from cache when a core-file fetch fails offline.
    #[serde(default = "default_offline_fallback")]
    pub offline_fallback: String,

    /// Path to SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_cache_name() -> String {
    "offshore".into()
}

fn default_cache_version() -> String {
    "1.0".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_manifest() -> Vec<String> {
    vec!["/".into(), "/index.html".into(), "/manifest.json".into()]
}

fn default_core_markers() -> Vec<String> {
    vec!["leaflet".into(), ".geojson".into(), "manifest.json".into()]
}

fn default_tile_patterns() -> Vec<String> {
    vec![
        r"^https://.*\.tile\.openstreetmap\.org/\d+/\d+/\d+\.png".into(),
        r"^https://tileservice\.charts\.noaa\.gov/tiles/50000_1/\d+/\d+/\d+\.png".into(),
    ]
}

fn default_offline_fallback() -> String {
    "/index.html".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offshore-cache.sqlite")
}

fn default_user_agent() -> String {
    "offshore/0.1".into()
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
            cache_name: default_cache_name(),
            cache_version: default_cache_version(),
            origin: default_origin(),
            manifest: default_manifest(),
            core_markers: default_core_markers(),
            tile_patterns: default_tile_patterns(),
            offline_fallback: default_offline_fallback(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// The generation this configuration treats as active.
    pub fn generation(&self) -> Generation {
        Generation::new(&self.cache_name, &self.cache_version)
    }

    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolve a manifest entry or fallback path to an absolute URL.
    ///
    /// Absolute URLs pass through untouched; paths are joined against the
    /// configured origin.
    pub fn resolve(&self, entry: &str) -> Result<url::Url, ConfigError> {
        if entry.contains("://") {
            return url::Url::parse(entry).map_err(|e| ConfigError::Invalid {
                field: "manifest".into(),
                reason: format!("{entry}: {e}"),
            });
        }

        let origin = url::Url::parse(&self.origin).map_err(|e| ConfigError::Invalid {
            field: "origin".into(),
            reason: e.to_string(),
        })?;

        origin.join(entry).map_err(|e| ConfigError::Invalid {
            field: "manifest".into(),
            reason: format!("{entry}: {e}"),
        })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OFFSHORE_`
    /// 2. TOML file from `OFFSHORE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFSHORE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFSHORE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

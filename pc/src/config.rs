//! promptcatalog configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::CatalogRoots;
use crate::collections::default_collections_path;

/// Main promptcatalog configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Strategy directory roots
    pub catalog: CatalogConfig,

    /// Cache sizing and lifetimes
    pub cache: CacheConfig,

    /// Filesystem watch settings
    pub watch: WatchConfig,

    /// Collection registry location
    pub collections: CollectionsConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: promptcatalog.yml
        let local_config = PathBuf::from("promptcatalog.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/promptcatalog/promptcatalog.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("promptcatalog").join("promptcatalog.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Strategy directory roots
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Built-in strategies directory
    #[serde(rename = "builtin-root")]
    pub builtin_root: PathBuf,

    /// Optional custom strategies directory
    #[serde(rename = "custom-root")]
    pub custom_root: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            builtin_root: PathBuf::from("metaprompts"),
            custom_root: None,
        }
    }
}

impl CatalogConfig {
    pub fn roots(&self) -> CatalogRoots {
        CatalogRoots::new(self.builtin_root.clone(), self.custom_root.clone())
    }
}

/// Cache sizing and lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries in the resolved-collection cache
    pub capacity: usize,

    /// Default entry lifetime for the resolved-collection cache, 0 disables expiry
    #[serde(rename = "ttl-ms")]
    pub ttl_ms: u64,

    /// Lifetime of cached strategy file parses
    #[serde(rename = "content-ttl-ms")]
    pub content_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            ttl_ms: 300_000,
            content_ttl_ms: 300_000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_ms > 0).then(|| Duration::from_millis(self.ttl_ms))
    }

    pub fn content_ttl(&self) -> Duration {
        Duration::from_millis(self.content_ttl_ms)
    }
}

/// Filesystem watch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Whether `pc watch` subscribes at all
    #[serde(default = "default_watch_enabled")]
    pub enabled: bool,

    /// Quiet period after a change before reloading
    #[serde(rename = "debounce-ms", default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Interval between content cache sweeps
    #[serde(rename = "sweep-interval-secs", default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_watch_enabled() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 100,
            sweep_interval_secs: 60,
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Sweep interval as a Duration, never zero
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Collection registry location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionsConfig {
    /// Registry file; falls back to the environment, then the user config dir
    pub path: Option<PathBuf>,
}

impl CollectionsConfig {
    pub fn resolve_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_collections_path)
    }
}

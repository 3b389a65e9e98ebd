//! Configuration file for tangoview
//!
//! Read from `<config dir>/tangoview/config.toml` unless a path is given on
//! the command line. Every key is optional.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use tangoview_logs::{FilterCriteria, Level, StoreConfig};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default tracing directive when RUST_LOG is not set
    pub log_level: String,

    pub store: StoreConfig,

    /// Filter applied at startup
    pub filter: FilterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            store: StoreConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_level: Level,
    pub source: String,
    pub timestamp: String,
    pub thread: String,
    pub message: String,
}

impl FilterConfig {
    pub fn to_criteria(&self) -> FilterCriteria {
        FilterCriteria::new()
            .with_min_level(self.min_level)
            .with_source(&self.source)
            .with_timestamp(&self.timestamp)
            .with_thread(&self.thread)
            .with_message(&self.message)
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        let dir = dirs::config_dir()?;
        Some(dir.join("tangoview").join("config.toml"))
    }

    /// Load from `path`, or from the default location if it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.store.validate()?;
        Ok(config)
    }
}

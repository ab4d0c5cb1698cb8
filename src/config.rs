//! Configuration management
//!
//! Reads `config.toml` from the platform config directory (or an explicit
//! path). Every key is optional; a missing file means defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::learning::LearnerConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Pattern learning and store settings
    #[serde(default)]
    pub patterns: LearnerConfig,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load configuration from a specific file, using defaults if it is absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)?;
        config.patterns = config.patterns.validate();
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "arrow-tuning", "arrow-patterns")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

//! Configuration file support for sp-osi
//!
//! Loads `.sp-osi.toml` from the current directory or its parents.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = ".sp-osi.toml";

/// Configuration file structure
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub output: OutputConfig,
    pub backup: BackupConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the StorPool templates; a component's files live under `<root>/<component>`
    pub templates: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format: "text", "json" or "diff"
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Save originals next to files merged in place
    pub enabled: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load config searching from the current directory upward
    pub fn load() -> Result<Option<(Config, PathBuf)>> {
        Self::load_from(std::env::current_dir()?)
    }

    /// Load config searching from the given directory upward
    pub fn load_from(start_dir: PathBuf) -> Result<Option<(Config, PathBuf)>> {
        let mut current = Some(start_dir.as_path());

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                let config = Self::load_path(&config_path)?;
                return Ok(Some((config, config_path)));
            }
            current = dir.parent();
        }

        Ok(None)
    }

    /// Load config from a specific path
    pub fn load_path(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Template directory for a component, when the command line gave none
    pub fn templates_for(&self, component: &str) -> Option<PathBuf> {
        self.paths
            .templates
            .as_ref()
            .map(|root| root.join(component))
    }
}

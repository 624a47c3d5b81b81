//! src/config.rs
//! ============================================================================
//! # Config: Application Configuration Loader and Saver
//!
//! Loads and saves settings as TOML from the platform config directory
//! resolved with [`directories`](https://docs.rs/directories). A missing file
//! yields the defaults, which are written back so the user has something to
//! edit.
//!
//! ## Example
//! ```rust,ignore
//! let config = Config::load()?;
//! config.save()?;
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::logging::LoggerConfig;
use crate::operators::search_task::MAX_SEARCH_RESULTS;

/// Recursive search settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Matches kept before the walk stops with a truncation marker.
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: MAX_SEARCH_RESULTS,
        }
    }
}

/// Background worker and result drain timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// How long the worker blocks waiting for a job before rechecking its stop flag.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Interactive loop tick between result drains.
    #[serde(with = "humantime_serde")]
    pub drain_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            drain_interval: Duration::from_millis(100),
        }
    }
}

/// Main configuration struct for the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub show_hidden: bool,

    pub search: SearchConfig,

    pub queue: QueueConfig,

    pub logging: LoggerConfig,
}

impl Config {
    /// Loads config from the platform config dir, or returns (and writes) defaults.
    ///
    /// The config is expected at `$XDG_CONFIG_HOME/fsb/config.toml`
    /// (Linux), or equivalent on Windows/macOS.
    pub fn load() -> anyhow::Result<Self> {
        let path: PathBuf = Self::config_path()?;

        Self::load_from(&path)
    }

    /// Loads config from an explicit path, creating it with defaults if absent.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            info!("Loading config from {}", path.display());

            let text: String = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let cfg: Self = toml::from_str(&text)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;

            Ok(cfg)
        } else {
            info!(
                "No config file found at {}, using default configuration. Creating it now.",
                path.display()
            );

            let default_config: Self = Self::default();
            default_config.save_to(path)?;

            Ok(default_config)
        }
    }

    /// Saves config to the platform config dir.
    pub fn save(&self) -> anyhow::Result<()> {
        let path: PathBuf = Self::config_path()?;

        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        info!("Saving config to {}", path.display());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_str: String = toml::to_string_pretty(self)?;
        fs::write(path, toml_str)?;

        Ok(())
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the config directory (without filename).
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let proj_dirs: ProjectDirs = ProjectDirs::from("org", "fsb", "fsb")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory."))?;

        Ok(proj_dirs.config_dir().to_path_buf())
    }
}

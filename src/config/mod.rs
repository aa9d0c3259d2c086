//! Configuration management
//!
//! Handles loading, validation, and merging of tool settings from:
//! - TOML files
//! - Environment variables
//! - CLI arguments

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod types;

pub use types::{BackendConfig, LoggingConfig, MonitorsConfig, WatchConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Stored layout settings
    #[serde(default)]
    pub monitors: MonitorsConfig,
    /// Display server connection
    #[serde(default)]
    pub backend: BackendConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Hotplug watching
    #[serde(default)]
    pub watch: WatchConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Default location: `$XDG_CONFIG_HOME/mate-rr/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mate-rr").join("config.toml"))
    }

    /// Create default configuration
    pub fn default_config() -> Result<Self> {
        Ok(Config::default())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.backend.kind.as_str() {
            "x11" => {
                if !cfg!(feature = "x11") {
                    anyhow::bail!("Backend 'x11' requires building with the x11 feature");
                }
            }
            "memory" => {
                let Some(fixture) = &self.backend.fixture else {
                    anyhow::bail!("Backend 'memory' requires a fixture file");
                };
                if !fixture.exists() {
                    anyhow::bail!("Fixture not found: {:?}", fixture);
                }
            }
            other => anyhow::bail!("Invalid backend: {}", other),
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!("Invalid log level: {}", other),
        }

        if self.watch.interval_ms == 0 {
            anyhow::bail!("Watch interval must be greater than zero");
        }

        Ok(())
    }

    /// Override config with CLI arguments
    pub fn with_overrides(
        mut self,
        backend: Option<String>,
        fixture: Option<PathBuf>,
        monitors_file: Option<PathBuf>,
    ) -> Self {
        if let Some(fixture) = fixture {
            // A fixture only makes sense for the simulated server.
            self.backend.kind = "memory".to_string();
            self.backend.fixture = Some(fixture);
        }
        if let Some(kind) = backend {
            self.backend.kind = kind;
        }
        if let Some(file) = monitors_file {
            self.monitors.file = Some(file);
        }

        self
    }

    /// Layout file in effect
    pub fn monitors_path(&self) -> Result<PathBuf> {
        self.monitors
            .file
            .clone()
            .or_else(crate::monitors::intended_path)
            .context("Cannot determine the user configuration directory")
    }
}

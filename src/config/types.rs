//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stored layout settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorsConfig {
    /// Layout file (None = `$XDG_CONFIG_HOME/monitors.xml`)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Display server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend to use ("x11", "memory")
    pub kind: String,

    /// X display to open (None = `$DISPLAY`)
    #[serde(default)]
    pub display: Option<String>,

    /// Hardware description for the memory backend (TOML)
    #[serde(default)]
    pub fixture: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: if cfg!(feature = "x11") { "x11" } else { "memory" }.to_string(),
            display: None,
            fixture: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    pub level: String,

    /// Directory for log files (None = console only)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
        }
    }
}

/// Hotplug watching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// How often to poll the server for changes, in milliseconds
    pub interval_ms: u64,

    /// Apply the stored layout when the attached monitors change
    pub auto_apply: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            auto_apply: true,
        }
    }
}

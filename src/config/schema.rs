//! Configuration schema

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// On-save watcher settings
    #[serde(default)]
    pub watch: WatchConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable desktop notifications for failed rules
    #[serde(default)]
    pub notifications_enabled: bool,

    /// Use this rules directory instead of resolving one from the workspace
    #[serde(default)]
    pub rules_dir: Option<PathBuf>,

    /// Shell for "Run Command" rules (defaults to sh, or cmd on Windows)
    #[serde(default)]
    pub shell: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            notifications_enabled: false,
            rules_dir: None,
            shell: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Settings for the on-save watcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Seconds during which repeated saves of one file count once
    #[serde(default = "default_debounce")]
    pub debounce_seconds: u64,

    /// Polling interval in seconds for backends that poll
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,

    /// Watch subdirectories of the workspace
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Glob patterns for paths that never count as saves
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_seconds: default_debounce(),
            polling_interval_secs: default_polling_interval(),
            recursive: true,
            ignore: default_ignore(),
        }
    }
}

fn default_debounce() -> u64 {
    2
}

fn default_polling_interval() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_ignore() -> Vec<String> {
    vec![
        "**/.git/*".to_string(),
        "**/target/*".to_string(),
        "**/node_modules/*".to_string(),
    ]
}

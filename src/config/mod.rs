//! Configuration management

mod schema;

pub use schema::{Config, GeneralConfig, WatchConfig};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::store::RuleStore;

impl Config {
    /// Load configuration from a file or default location
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path.map(PathBuf::from).or_else(Self::default_path) {
            Some(p) => p,
            None => return Ok(Self::default()),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

            let config: Config = toml::from_str(&content).with_context(|| {
                format!("Failed to parse config from {}", config_path.display())
            })?;

            Ok(config)
        } else if path.is_some() {
            anyhow::bail!("Config file not found: {}", config_path.display())
        } else {
            Ok(Self::default())
        }
    }

    /// Get the default config file path
    /// Uses the platform config directory (via dirs::config_dir), falling back to ~/.config
    pub fn default_path() -> Option<PathBuf> {
        let config_base =
            dirs::config_dir().or_else(|| dirs::home_dir().map(|d| d.join(".config")))?;
        Some(config_base.join("onevent").join("config.toml"))
    }

    /// Rule store for a workspace, honouring an explicit `rules_dir` override
    pub fn rule_store(&self, workspace: Option<&Path>) -> RuleStore {
        match &self.general.rules_dir {
            Some(dir) => RuleStore::new(crate::expand_path(dir)),
            None => RuleStore::for_workspace(workspace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_explicit_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[general]\nnotifications_enabled = true\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!(config.general.notifications_enabled);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&tmp.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_rule_store_override() {
        let mut config = Config::default();
        let workspace = Path::new("/work/repo");
        assert_eq!(
            config.rule_store(Some(workspace)).dir(),
            Path::new("/work/repo/SavedEventActions")
        );

        config.general.rules_dir = Some(PathBuf::from("/srv/rules"));
        assert_eq!(
            config.rule_store(Some(workspace)).dir(),
            Path::new("/srv/rules")
        );
    }
}

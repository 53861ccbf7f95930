//! Configuration Management
//!
//! Handles persistent configuration storage for cost-saver.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One account defined in the config file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AccountConfig {
    pub id: String,
    pub name: String,
    pub region: String,
    /// Gateway base URL; defaults to the regional gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Toast and history settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationSettings {
    #[serde(default = "default_toast_duration")]
    pub toast_duration_secs: u64,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_toast_duration() -> u64 {
    5
}

fn default_max_history() -> usize {
    50
}

fn default_true() -> bool {
    true
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            toast_duration_secs: default_toast_duration(),
            max_history: default_max_history(),
        }
    }
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    /// Start with the refresh scheduler running
    #[serde(default = "default_true")]
    pub auto_refresh: bool,
    /// Last viewed section key (`compute`, `database`, `container`)
    #[serde(default)]
    pub last_section: Option<String>,
    /// Cap on accounts queried at once; unset means all at once
    #[serde(default)]
    pub max_concurrent_accounts: Option<usize>,
    #[serde(default)]
    pub notifications: NotificationSettings,

    /// Where this config was loaded from and will be saved to
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            auto_refresh: true,
            last_section: None,
            max_concurrent_accounts: None,
            notifications: NotificationSettings::default(),
            path: None,
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cost-saver").join("config.json"))
    }

    /// Load configuration from `path`, or the default location.
    /// A missing or unreadable file yields defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Self::default();
        };

        let mut config = if path.exists() {
            match Self::read(&path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Ignoring config {}: {:#}", path.display(), e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.path = Some(path);
        config
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        if is_yaml(path) {
            serde_yaml::from_str(&content).context("Invalid YAML config")
        } else {
            serde_json::from_str(&content).context("Invalid JSON config")
        }
    }

    /// Save configuration to disk. An in-memory config saves nothing.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = if is_yaml(path) {
            serde_yaml::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Set last section and save
    pub fn set_last_section(&mut self, section: &str) -> Result<()> {
        self.last_section = Some(section.to_string());
        self.save()
    }

    /// Set auto-refresh and save
    pub fn set_auto_refresh(&mut self, enabled: bool) -> Result<()> {
        self.auto_refresh = enabled;
        self.save()
    }

    /// Config that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

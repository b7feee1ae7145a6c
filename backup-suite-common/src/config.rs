// Centralized configuration for Backup Suite

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Backup Suite configuration with support for environment variable overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Directory holding the daily log files (default: ./logs)
    pub log_dir: PathBuf,

    /// Drive mapping command (default: net)
    pub net_command: String,

    /// Timeout for map and list invocations, in seconds
    pub net_timeout_secs: u64,

    /// Timeout for unmap invocations, in seconds
    pub unmap_timeout_secs: u64,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        let log_dir = std::env::current_dir()
            .map(|dir| dir.join("logs"))
            .unwrap_or_else(|_| PathBuf::from("logs"));

        Self {
            log_dir,
            net_command: "net".to_string(),
            net_timeout_secs: 10,
            unmap_timeout_secs: 5,
        }
    }
}

impl SuiteConfig {
    /// Create a new configuration with environment variable overrides
    ///
    /// Supported environment variables:
    /// - BACKUP_SUITE_LOG_DIR: Override log directory
    /// - BACKUP_SUITE_NET_COMMAND: Override the drive mapping command
    /// - BACKUP_SUITE_NET_TIMEOUT_SECS: Override map/list timeout
    /// - BACKUP_SUITE_UNMAP_TIMEOUT_SECS: Override unmap timeout
    pub fn new() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Get the default config file path (~/.config/backup-suite/config.toml)
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(dir.join("backup-suite").join("config.toml"))
    }

    /// Load configuration from file, then apply environment overrides
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("BACKUP_SUITE_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }

        if let Ok(command) = std::env::var("BACKUP_SUITE_NET_COMMAND") {
            if !command.trim().is_empty() {
                self.net_command = command;
            }
        }

        if let Ok(secs) = std::env::var("BACKUP_SUITE_NET_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                self.net_timeout_secs = secs;
            }
        }

        if let Ok(secs) = std::env::var("BACKUP_SUITE_UNMAP_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                self.unmap_timeout_secs = secs;
            }
        }
    }

    pub fn net_timeout(&self) -> Duration {
        Duration::from_secs(self.net_timeout_secs)
    }

    pub fn unmap_timeout(&self) -> Duration {
        Duration::from_secs(self.unmap_timeout_secs)
    }
}

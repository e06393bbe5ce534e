//! Configuration management for claimguard.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Command-line flags (--timeout, --store)
//! 2. Environment variables (CLAIMGUARD_*)
//! 3. Config file (<data dir>/config.toml, or $CLAIMGUARD_CONFIG)
//! 4. Default values

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use claimguard_core::SessionConfig;

use crate::cli::GlobalArgs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Session lifecycle settings
    #[serde(default)]
    pub session: SessionSettings,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Background timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Key-value store file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

// Default value functions
fn default_timeout_secs() -> u64 {
    600 // 10 minutes
}

fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "claimguard", "claimguard") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".claimguard")
    }
}

fn default_store_path() -> PathBuf {
    default_data_dir().join("store.json")
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session: SessionSettings::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::from_toml(
                &std::fs::read_to_string(&config_path).context("Failed to read config file")?,
            )?
        } else {
            Config::default()
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("CLAIMGUARD_CONFIG") {
            PathBuf::from(path)
        } else {
            default_data_dir().join("config.toml")
        }
    }

    /// Apply CLAIMGUARD_* overrides from the given variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("CLAIMGUARD_SESSION_TIMEOUT_SECS") {
            self.session.timeout_secs = value
                .trim()
                .parse()
                .context("CLAIMGUARD_SESSION_TIMEOUT_SECS must be a whole number of seconds")?;
        }
        if let Some(value) = lookup("CLAIMGUARD_STORE") {
            self.storage.path = PathBuf::from(value);
        }
        Ok(())
    }

    /// Apply command-line overrides.
    pub fn apply_args(&mut self, args: &GlobalArgs) {
        if let Some(timeout) = args.timeout {
            self.session.timeout_secs = timeout;
        }
        if let Some(store) = &args.store {
            self.storage.path = store.clone();
        }
    }

    /// Session config handed to the lifecycle manager.
    pub fn session_config(&self) -> Result<SessionConfig> {
        SessionConfig::from_secs(self.session.timeout_secs).context("Invalid session timeout")
    }
}

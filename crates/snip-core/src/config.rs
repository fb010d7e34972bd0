//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/snip/config.toml)
//! 3. Environment variables (SNIP_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "SNIP";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for local data storage (SQLite record store)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL of the snippet API (for remote sync)
    #[serde(default)]
    pub api_url: Option<String>,

    /// Acting identity for CLI operations
    #[serde(default)]
    pub user: Option<String>,

    /// Debounce window for the save coordinator, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long terminal save messages stay visible, in milliseconds
    #[serde(default = "default_message_display_ms")]
    pub message_display_ms: u64,

    /// Maximum save attempts per request (network failures only)
    #[serde(default = "default_save_max_attempts")]
    pub save_max_attempts: u32,

    /// Initial backoff between retries, in milliseconds (doubles per attempt)
    #[serde(default = "default_save_backoff_ms")]
    pub save_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api_url: None,
            user: None,
            debounce_ms: default_debounce_ms(),
            message_display_ms: default_message_display_ms(),
            save_max_attempts: default_save_max_attempts(),
            save_backoff_ms: default_save_backoff_ms(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SNIP_DATA_DIR, SNIP_API_URL, SNIP_USER)
    /// 2. Config file (~/.config/snip/config.toml or SNIP_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // SNIP_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // SNIP_API_URL
        if let Ok(val) = std::env::var(format!("{}_API_URL", ENV_PREFIX)) {
            self.api_url = if val.is_empty() { None } else { Some(val) };
        }

        // SNIP_USER
        if let Ok(val) = std::env::var(format!("{}_USER", ENV_PREFIX)) {
            self.user = if val.is_empty() { None } else { Some(val) };
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with SNIP_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("snip")
            .join("config.toml")
    }

    /// Get the path to the SQLite record store
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("snip.db")
    }

    /// Debounce window as a duration
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Message display duration
    pub fn message_display(&self) -> Duration {
        Duration::from_millis(self.message_display_ms)
    }

    /// Initial retry backoff
    pub fn save_backoff(&self) -> Duration {
        Duration::from_millis(self.save_backoff_ms)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("snip")
}

fn default_debounce_ms() -> u64 {
    750
}

fn default_message_display_ms() -> u64 {
    2500
}

fn default_save_max_attempts() -> u32 {
    3
}

fn default_save_backoff_ms() -> u64 {
    1000
}

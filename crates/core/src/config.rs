//! Configuration management
//!
//! This module handles loading and migrating the bt configuration file.
//! The configuration file is stored in TOML format at ~/.config/bt/config.toml,
//! or under `$BT_CONFIG_DIR` when that variable is set.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::endpoint::EndpointConfig;
use crate::error::{Error, Result};

/// Current configuration schema version
///
/// Bumping this version requires adding a step to `ConfigManager::migrate`.
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "BT_CONFIG_DIR";

/// Default number of concurrent transfers
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Default settings
    #[serde(default)]
    pub defaults: Defaults,

    /// Storage provider endpoint
    #[serde(default)]
    pub endpoint: EndpointConfig,
}

/// Default settings for transfer behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Number of concurrent transfers
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Work queue capacity; 0 means twice the worker count
    #[serde(default)]
    pub queue_capacity: usize,

    /// Show progress bars
    #[serde(default = "default_true")]
    pub progress: bool,
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_true() -> bool {
    true
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            queue_capacity: 0,
            progress: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            defaults: Defaults::default(),
            endpoint: EndpointConfig::default(),
        }
    }
}

/// Configuration manager handles loading config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("Could not determine config directory".into()))?
                .join("bt"),
        };
        Ok(Self {
            config_path: config_dir.join("config.toml"),
        })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// If the configuration file doesn't exist, returns a default configuration.
    /// If the schema version doesn't match, attempts migration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config)?;
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade bt.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        if config.defaults.max_workers == 0 {
            return Err(Error::Config(
                "defaults.max_workers must be at least 1".into(),
            ));
        }

        Ok(config)
    }

    /// Migrate configuration from older schema version
    fn migrate(&self, config: Config) -> Result<Config> {
        let mut config = config;
        config.schema_version = SCHEMA_VERSION;
        Ok(config)
    }
}

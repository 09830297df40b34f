//! Configuration management
//!
//! This module handles loading, validation, and management of the Warden configuration.
//! Configuration is stored in TOML format at ~/.warden/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Plugin directory and log level
//! - **plugins**: Ordered list of enabled plugins and the instantiation timeout
//! - **validator**: Import allow-list, call deny-list and the unsafe-code switch
//!
//! # Path Expansion
//!
//! `core.plugins_dir` expands a leading `~` to the user's home directory and
//! is canonicalized when it already exists. A missing plugin directory is not
//! a configuration error; every plugin load then fails its layout check.
//!
//! # Examples
//!
//! ```no_run
//! use warden_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Plugins: {:?}", config.core.plugins_dir);
//! println!("Enabled: {:?}", config.plugins.enabled);
//! # Ok(())
//! # }
//! ```

use crate::code_validator::{DEFAULT_ALLOWED_IMPORTS, DEFAULT_BLOCKED_CALLS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use warden_sdk::errors::EngineError;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    pub core: CoreConfig,

    /// Plugin enablement
    #[serde(default)]
    pub plugins: PluginsConfig,

    /// Static code validator rules
    #[serde(default)]
    pub validator: ValidatorConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Directory holding one subdirectory per plugin (supports ~ expansion)
    #[serde(default = "default_plugins_dir")]
    pub plugins_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Plugins enablement configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Plugins to load at startup, in load order
    #[serde(default = "default_enabled_plugins")]
    pub enabled: Vec<String>,

    /// Upper bound on constructing one plugin instance (seconds)
    #[serde(default = "default_instantiate_timeout")]
    pub instantiate_timeout_secs: u64,
}

/// Static code validator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Crates plugins may import
    #[serde(default = "default_allowed_imports")]
    pub allowed_imports: Vec<String>,

    /// Function and method names plugins may not call
    #[serde(default = "default_blocked_calls")]
    pub blocked_calls: Vec<String>,

    /// Reject any unsafe block, fn, impl or trait
    #[serde(default = "default_true")]
    pub deny_unsafe: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            plugins_dir: default_plugins_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_plugins(),
            instantiate_timeout_secs: default_instantiate_timeout(),
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            allowed_imports: default_allowed_imports(),
            blocked_calls: default_blocked_calls(),
            deny_unsafe: true,
        }
    }
}

// Default value functions
fn default_plugins_dir() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_enabled_plugins() -> Vec<String> {
    ["gdpr_plugin", "security_plugin", "analytics_plugin"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_instantiate_timeout() -> u64 {
    5
}

fn default_allowed_imports() -> Vec<String> {
    DEFAULT_ALLOWED_IMPORTS.iter().map(|s| s.to_string()).collect()
}

fn default_blocked_calls() -> Vec<String> {
    DEFAULT_BLOCKED_CALLS.iter().map(|s| s.to_string()).collect()
}

impl Config {
    /// Load configuration from the default location (~/.warden/config.toml)
    ///
    /// If the configuration file doesn't exist, writes a default one first.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or written
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, TOML parsing fails or
    /// validation fails.
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        // Serialize before processing so the file keeps the portable defaults
        let mut config = Self::default();
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        config.validate_and_process()?;
        tracing::info!("Wrote default configuration to {:?}", path);

        Ok(config)
    }

    /// Get the default configuration file path (~/.warden/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".warden").join("config.toml"))
    }

    /// Instantiation timeout as a `Duration`
    pub fn instantiate_timeout(&self) -> Duration {
        Duration::from_secs(self.plugins.instantiate_timeout_secs)
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates the log level
    /// - Requires a timeout of at least one second
    /// - Rejects empty or duplicate plugin names
    /// - Rejects an empty import allow-list
    /// - Expands ~ in `plugins_dir` and canonicalizes it when present
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.plugins.instantiate_timeout_secs == 0 {
            return Err(EngineError::Config(
                "instantiate_timeout_secs must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for name in &self.plugins.enabled {
            if name.trim().is_empty() {
                return Err(EngineError::Config(
                    "Enabled plugin names must not be empty".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(EngineError::Config(format!(
                    "Plugin '{}' is enabled more than once",
                    name
                )));
            }
        }

        if self.validator.allowed_imports.is_empty() {
            return Err(EngineError::Config(
                "validator.allowed_imports must name at least one crate".to_string(),
            ));
        }

        self.core.plugins_dir = expand_path(&self.core.plugins_dir)?;
        if self.core.plugins_dir.exists() {
            self.core.plugins_dir = self.core.plugins_dir.canonicalize().map_err(|e| {
                EngineError::PathCanonicalization(self.core.plugins_dir.clone(), e.to_string())
            })?;
        } else {
            tracing::warn!("Plugin directory {:?} does not exist", self.core.plugins_dir);
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

//! Configuration using Figment.
//!
//! Configuration is layered, lowest precedence first:
//! 1. Built-in defaults
//! 2. `autofocus.toml` (or the file passed to [`AutofocusConfig::load_from`])
//! 3. Environment variables prefixed with `AUTOFOCUS_`, `__` separating levels
//!
//! ```text
//! AUTOFOCUS_LOGGING__LEVEL=debug
//! AUTOFOCUS_SETTINGS__BACKEND=file
//! AUTOFOCUS_SETTINGS__PATH=/var/lib/scope/autofocus.json
//! AUTOFOCUS_PROXY__LOCK_SELECTION=false
//! ```
//!
//! # Example file
//!
//! ```toml
//! [logging]
//! level = "info"
//! json = false
//!
//! [settings]
//! backend = "file"
//! path = "autofocus-settings.json"
//!
//! [proxy]
//! lock_selection = true
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::error::SettingsError;
use crate::settings::{JsonFileSettings, MemorySettings, SettingsBridge};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "autofocus.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "AUTOFOCUS_";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The layered sources could not be merged or deserialized.
    #[error("Configuration load error: {0}")]
    LoadError(#[from] figment::Error),
    /// Values parsed but are not usable.
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutofocusConfig {
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Where software autofocus values are persisted
    #[serde(default)]
    pub settings: SettingsConfig,
    /// Hardware proxy behaviour
    #[serde(default)]
    pub proxy: ProxyConfig,
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Settings store selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsBackend {
    /// Process-local, lost on exit
    #[default]
    Memory,
    /// JSON file on disk
    File,
}

/// Settings store configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Which store to use
    #[serde(default)]
    pub backend: SettingsBackend,
    /// File path for the `file` backend. Defaults to the user config directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Hardware proxy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Hold a per-proxy lock across select-then-act
    #[serde(default = "default_lock_selection")]
    pub lock_selection: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            lock_selection: default_lock_selection(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_lock_selection() -> bool {
    true
}

impl AutofocusConfig {
    /// Load from [`DEFAULT_CONFIG_FILE`] and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from a specific file and the environment, then validate.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        if self.settings.backend == SettingsBackend::File && self.settings.file_path().is_none() {
            return Err(ConfigError::ValidationError(
                "File settings backend needs 'settings.path' (no user config directory found)"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl SettingsConfig {
    /// Path used by the file backend.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(JsonFileSettings::default_path)
    }

    /// Open the configured store.
    pub fn open(&self) -> Result<Arc<dyn SettingsBridge>, SettingsError> {
        match self.backend {
            SettingsBackend::Memory => Ok(Arc::new(MemorySettings::new())),
            SettingsBackend::File => {
                let path = self.file_path().ok_or(SettingsError::NoLocation)?;
                Ok(Arc::new(JsonFileSettings::open(path)?))
            }
        }
    }
}

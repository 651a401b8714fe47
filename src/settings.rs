//! Durable key/value storage for autofocus property values.
//!
//! The software variant persists the *values* of its properties (never their
//! structure) through a [`SettingsBridge`], namespaced by the implementation's
//! identity. Two stores are provided:
//!
//! - [`MemorySettings`] - process-local, used in tests and by default.
//! - [`JsonFileSettings`] - one JSON document of the form
//!   `{ "<namespace>": { "<key>": "<value>" } }`, rewritten on every put.

use crate::error::SettingsError;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

type Namespaces = BTreeMap<String, BTreeMap<String, String>>;

/// Durable per-namespace string store.
pub trait SettingsBridge: Send + Sync {
    /// Store `value` under `namespace`/`key`.
    fn put_string(&self, namespace: &str, key: &str, value: &str) -> Result<(), SettingsError>;

    /// Read `namespace`/`key`, or `default` when nothing is stored.
    fn get_string(&self, namespace: &str, key: &str, default: &str) -> String;
}

/// In-memory settings store.
#[derive(Debug, Default)]
pub struct MemorySettings {
    entries: RwLock<Namespaces>,
}

impl MemorySettings {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsBridge for MemorySettings {
    fn put_string(&self, namespace: &str, key: &str, value: &str) -> Result<(), SettingsError> {
        self.entries
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_string(&self, namespace: &str, key: &str, default: &str) -> String {
        lookup(&self.entries.read(), namespace, key, default)
    }
}

/// Settings store backed by a JSON file.
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    entries: RwLock<Namespaces>,
}

impl JsonFileSettings {
    /// Open the store at `path`, loading existing content if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let entries = if path.exists() {
            let text = fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                Namespaces::new()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            Namespaces::new()
        };
        tracing::debug!(path = %path.display(), namespaces = entries.len(), "Opened settings file");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Default location: `<config dir>/autofocus/settings.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("autofocus").join("settings.json"))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_out(&self, entries: &Namespaces) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

impl SettingsBridge for JsonFileSettings {
    fn put_string(&self, namespace: &str, key: &str, value: &str) -> Result<(), SettingsError> {
        let mut entries = self.entries.write();
        let mut updated = entries.clone();
        updated
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.write_out(&updated)?;
        *entries = updated;
        Ok(())
    }

    fn get_string(&self, namespace: &str, key: &str, default: &str) -> String {
        lookup(&self.entries.read(), namespace, key, default)
    }
}

fn lookup(entries: &Namespaces, namespace: &str, key: &str, default: &str) -> String {
    entries
        .get(namespace)
        .and_then(|keys| keys.get(key))
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

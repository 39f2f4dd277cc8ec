use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, warn};

use chattray_protocol::types::OAuthToken;

use crate::preferences::TrayPreferences;
use crate::{KEY_DOMAIN, KEY_TOKEN, KEY_TRAY, SettingsError};

/// Key-value settings persistence.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value) -> Result<(), SettingsError>;
    fn delete(&self, key: &str) -> Result<(), SettingsError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Volatile store, used when no settings file is available.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<BTreeMap<String, Value>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), SettingsError> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// Settings cached in memory and persisted to a JSON file on every write.
pub struct JsonFileSettings {
    path: PathBuf,
    values: RwLock<BTreeMap<String, Value>>,
}

impl JsonFileSettings {
    /// Opens the settings file, starting empty if it does not exist yet.
    pub fn open(path: PathBuf) -> Result<Self, SettingsError> {
        let values = load_values(&path)?;
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), SettingsError> {
        let json = {
            let map = self.values.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_string_pretty(&*map)?
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        set_permissions_0600(&self.path);
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

impl SettingsStore for JsonFileSettings {
    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        self.persist()
    }

    fn delete(&self, key: &str) -> Result<(), SettingsError> {
        let removed = self
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

fn load_values(path: &Path) -> Result<BTreeMap<String, Value>, SettingsError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(&content)?)
}

fn set_permissions_0600(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

// ---------------------------------------------------------------------------
// Typed view
// ---------------------------------------------------------------------------

/// Typed access to the application's setting keys.
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn SettingsStore>,
}

impl Settings {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Settings backed by a [`MemorySettings`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySettings::new()))
    }

    /// Seeds `domain` and `tray` on first run and returns the active domain.
    pub fn initialize_defaults(&self, default_domain: &str) -> Result<String, SettingsError> {
        match self.domain() {
            Some(domain) => Ok(domain),
            None => {
                self.set_domain(default_domain)?;
                self.set_tray(&TrayPreferences::default())?;
                Ok(default_domain.to_string())
            }
        }
    }

    pub fn domain(&self) -> Option<String> {
        self.store
            .get(KEY_DOMAIN)
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|d| !d.is_empty())
    }

    pub fn set_domain(&self, domain: &str) -> Result<(), SettingsError> {
        self.store.set(KEY_DOMAIN, Value::String(domain.to_string()))
    }

    /// Tray preferences, falling back to favorites when unset or unreadable.
    pub fn tray(&self) -> TrayPreferences {
        match self.store.get(KEY_TRAY) {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("unreadable tray preferences, using defaults: {e}");
                TrayPreferences::default()
            }),
            None => TrayPreferences::default(),
        }
    }

    pub fn set_tray(&self, prefs: &TrayPreferences) -> Result<(), SettingsError> {
        self.store.set(KEY_TRAY, serde_json::to_value(prefs)?)
    }

    /// The persisted token, if one with a non-empty access token exists.
    pub fn token(&self) -> Option<OAuthToken> {
        let value = self.store.get(KEY_TOKEN)?;
        match serde_json::from_value::<OAuthToken>(value) {
            Ok(token) if !token.access_token.is_empty() => Some(token),
            Ok(_) => None,
            Err(e) => {
                warn!("unreadable persisted token, ignoring: {e}");
                None
            }
        }
    }

    pub fn set_token(&self, token: &OAuthToken) -> Result<(), SettingsError> {
        self.store.set(KEY_TOKEN, serde_json::to_value(token)?)
    }

    pub fn clear_token(&self) -> Result<(), SettingsError> {
        self.store.delete(KEY_TOKEN)
    }
}

//! Local settings for the tray application.
//!
//! [`SettingsStore`] is the plain key-value seam; [`Settings`] layers the
//! typed keys the application uses (`domain`, `tray`, `token`) on top of
//! it. [`AppConfig`] is the read-only per-domain OAuth configuration
//! shipped with the application.

mod config;
mod preferences;
mod store;

pub use config::AppConfig;
pub use preferences::{PreferencesChange, PreferencesForm, TrayPreferences};
pub use store::{JsonFileSettings, MemorySettings, Settings, SettingsStore};

/// Setting key holding the selected service domain.
pub const KEY_DOMAIN: &str = "domain";

/// Setting key holding the [`TrayPreferences`].
pub const KEY_TRAY: &str = "tray";

/// Setting key holding the persisted OAuth token.
pub const KEY_TOKEN: &str = "token";

/// Errors from settings operations.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no OAuth configuration for domain {0}")]
    UnknownDomain(String),
}

//! Tray preferences and the preferences form.

use serde::{Deserialize, Serialize};

use crate::SettingsError;
use crate::store::Settings;

/// Number of custom conversation slots offered by the preferences form.
pub const CUSTOM_SLOTS: usize = 5;

/// Which conversations get a tray icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrayPreferences {
    /// Use the user's favorite conversations.
    #[serde(default = "default_true")]
    pub favorites: bool,
    /// Conversation ids to show instead of the favorites, in order.
    #[serde(default)]
    pub custom: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for TrayPreferences {
    fn default() -> Self {
        Self {
            favorites: true,
            custom: Vec::new(),
        }
    }
}

impl TrayPreferences {
    /// The custom ids to use, or `None` when the favorites apply.
    pub fn custom_ids(&self) -> Option<Vec<String>> {
        if self.favorites || !self.custom.iter().any(|c| !c.is_empty()) {
            return None;
        }
        Some(self.custom.iter().filter(|c| !c.is_empty()).cloned().collect())
    }
}

/// Values submitted from the preferences window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferencesForm {
    pub domain: String,
    pub favorites_checked: bool,
    pub custom: Vec<String>,
}

/// What the application must do after preferences were saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferencesChange {
    /// The domain changed: sign out and sign in again.
    ReLogin,
    /// Only the tray selection changed: rebuild the tray icons.
    ReInitialize,
}

impl PreferencesForm {
    /// Loads the form from the current settings.
    pub fn load(settings: &Settings) -> Self {
        let tray = settings.tray();
        Self {
            domain: settings.domain().unwrap_or_default(),
            favorites_checked: tray.favorites,
            custom: tray.custom.into_iter().take(CUSTOM_SLOTS).collect(),
        }
    }

    /// Normalised tray preferences: blanks dropped, at most
    /// [`CUSTOM_SLOTS`] ids, favorites forced on when nothing is left.
    pub fn tray_preferences(&self) -> TrayPreferences {
        let custom: Vec<String> = self
            .custom
            .iter()
            .take(CUSTOM_SLOTS)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        TrayPreferences {
            favorites: self.favorites_checked || custom.is_empty(),
            custom,
        }
    }

    /// Writes the form to the settings.
    pub fn save(&self, settings: &Settings) -> Result<PreferencesChange, SettingsError> {
        let old_domain = settings.domain();
        settings.set_domain(&self.domain)?;
        settings.set_tray(&self.tray_preferences())?;

        if old_domain.as_deref() != Some(self.domain.as_str()) {
            Ok(PreferencesChange::ReLogin)
        } else {
            Ok(PreferencesChange::ReInitialize)
        }
    }
}

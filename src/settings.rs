//! Player display preferences
//!
//! Persisted separately from game saves under `"<save key>_settings"`, so a
//! corrupt save never resets the player's notation choice.

use serde::{Deserialize, Serialize};

use crate::consts::AUTOSAVE_INTERVAL_SECS;
use crate::numeric::Notation;
use crate::persistence::SaveError;
use crate::platform::KeyValueStore;

/// Player settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number notation for every currency display
    pub notation: Notation,

    // === Autosave ===
    /// Seconds between autosaves (0 disables the timer)
    pub autosave_interval_secs: u32,
    /// Save when the game window is hidden or closed
    pub save_on_hide: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notation: Notation::Standard,

            autosave_interval_secs: AUTOSAVE_INTERVAL_SECS,
            save_on_hide: true,
        }
    }
}

impl Settings {
    /// Storage key for settings belonging to the save at `save_key`
    pub fn storage_key(save_key: &str) -> String {
        format!("{save_key}_settings")
    }

    pub fn autosave_interval_ms(&self) -> i64 {
        i64::from(self.autosave_interval_secs) * 1000
    }

    /// Load settings; anything missing or unreadable falls back to defaults
    pub fn load<S: KeyValueStore + ?Sized>(store: &S, save_key: &str) -> Self {
        match store.get(&Self::storage_key(save_key)) {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings");
                    return settings;
                }
                Err(err) => log::warn!("Ignoring unreadable settings: {err}"),
            },
            Ok(None) => {}
            Err(err) => log::warn!("Could not read settings: {err}"),
        }

        log::info!("Using default settings");
        Self::default()
    }

    pub fn save<S: KeyValueStore + ?Sized>(
        &self,
        store: &mut S,
        save_key: &str,
    ) -> Result<(), SaveError> {
        let json = serde_json::to_string(self)?;
        store.set(&Self::storage_key(save_key), &json)?;
        log::info!("Settings saved");
        Ok(())
    }
}

//! Settings loader for settings.toml

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::types::Settings;

const SETTINGS_FILENAME: &str = "settings.toml";
const CONFIG_DIR_NAME: &str = "pdn";

/// Where settings.toml lives for this user, if a config dir exists at all
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the given file.
///
/// Returns defaults if the file doesn't exist or can't be parsed; a bad
/// settings file should never keep the device from booting.
pub fn load_settings(path: &Path) -> Settings {
    if !path.exists() {
        debug!("No settings file at {:?}, using defaults", path);
        return Settings::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", path, e);
            Settings::default()
        }
    }
}

/// Load settings from the user's config dir
pub fn load_default_settings() -> Settings {
    match default_settings_path() {
        Some(path) => load_settings(&path),
        None => {
            debug!("No config dir on this platform, using default settings");
            Settings::default()
        }
    }
}

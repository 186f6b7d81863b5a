//! Device settings: timing knobs for the duel flow, sleep, and logging

mod settings;
mod types;

pub use settings::{default_settings_path, load_default_settings, load_settings};
pub use types::{DuelSettings, HandshakeSettings, LogSettings, Settings, SleepSettings};

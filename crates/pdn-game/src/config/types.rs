//! Tunable timings for the duel flow and device behavior
//!
//! Every section and field is optional in the TOML; anything missing takes
//! its default, so a settings file only states what it changes.

use serde::{Deserialize, Serialize};

/// Device settings (settings.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub handshake: HandshakeSettings,

    #[serde(default)]
    pub duel: DuelSettings,

    #[serde(default)]
    pub sleep: SleepSettings,

    #[serde(default)]
    pub log: LogSettings,
}

/// Beacon and handshake pacing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandshakeSettings {
    /// How often the bounty rebroadcasts its FDN beacon
    #[serde(default = "default_beacon_interval_ms")]
    pub beacon_interval_ms: u64,

    /// How long each handshake beat waits for the peer's reply
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// How long the detect screen waits for the hunter to choose
    #[serde(default = "default_fdn_decision_timeout_ms")]
    pub fdn_decision_timeout_ms: u64,

    /// Dwell on the connection screen before the countdown starts
    #[serde(default = "default_connected_beat_ms")]
    pub connected_beat_ms: u64,
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        Self {
            beacon_interval_ms: default_beacon_interval_ms(),
            response_timeout_ms: default_response_timeout_ms(),
            fdn_decision_timeout_ms: default_fdn_decision_timeout_ms(),
            connected_beat_ms: default_connected_beat_ms(),
        }
    }
}

fn default_beacon_interval_ms() -> u64 {
    1200
}

fn default_response_timeout_ms() -> u64 {
    5000
}

fn default_fdn_decision_timeout_ms() -> u64 {
    10_000
}

fn default_connected_beat_ms() -> u64 {
    1500
}

/// Duel timings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DuelSettings {
    /// Countdown length before the draw window opens
    #[serde(default = "default_countdown_ms")]
    pub countdown_ms: u64,

    /// How long a duel state waits before treating the draw as over
    #[serde(default = "default_window_timeout_ms")]
    pub window_timeout_ms: u64,

    /// Dwell on the win/lose screen
    #[serde(default = "default_result_display_ms")]
    pub result_display_ms: u64,
}

impl Default for DuelSettings {
    fn default() -> Self {
        Self {
            countdown_ms: default_countdown_ms(),
            window_timeout_ms: default_window_timeout_ms(),
            result_display_ms: default_result_display_ms(),
        }
    }
}

fn default_countdown_ms() -> u64 {
    3000
}

fn default_window_timeout_ms() -> u64 {
    5000
}

fn default_result_display_ms() -> u64 {
    8000
}

/// Idle sleep behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SleepSettings {
    /// Idle time with no cable and no input before the device sleeps
    #[serde(default = "default_sleep_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SleepSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_sleep_timeout_ms(),
        }
    }
}

fn default_sleep_timeout_ms() -> u64 {
    60_000
}

/// Log output
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogSettings {
    /// Directive string for the log filter, same syntax as PDN_LOG
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

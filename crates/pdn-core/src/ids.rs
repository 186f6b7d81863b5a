//! State and app identity
//!
//! A single integer newtype addresses both apps (Device's app table) and
//! states (a machine's state map). The two numeric spaces are disjoint by
//! convention: app ids are small integers 0-9, state ids are banded by
//! 100s per app so a state id never collides across apps.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an app or a state within an app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub u16);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for StateId {
    fn from(raw: u16) -> Self {
        StateId(raw)
    }
}

// ─────────────────────────────────────────────────────────────────
// App ids (Device app table)
// ─────────────────────────────────────────────────────────────────

pub const REGISTRATION_APP_ID: StateId = StateId(0);
pub const QUICKDRAW_APP_ID: StateId = StateId(1);
pub const KONAMI_APP_ID: StateId = StateId(2);

/// Minigame app ids in FDN-index order; FDN index `i` maps to app id `3 + i`.
pub const SIGNAL_ECHO_APP_ID: StateId = StateId(3);
pub const GHOST_RUNNER_APP_ID: StateId = StateId(4);
pub const SPIKE_VECTOR_APP_ID: StateId = StateId(5);
pub const FIREWALL_DECRYPT_APP_ID: StateId = StateId(6);
pub const CIPHER_PATH_APP_ID: StateId = StateId(7);
pub const EXPLOIT_SEQUENCER_APP_ID: StateId = StateId(8);
pub const BREACH_DEFENSE_APP_ID: StateId = StateId(9);

/// Number of reward-bearing minigames (the Konami button count)
pub const MINIGAME_COUNT: u8 = 7;

/// App id for the minigame at FDN index 0..=6
pub fn minigame_app_id(fdn_index: u8) -> StateId {
    debug_assert!(fdn_index < MINIGAME_COUNT);
    StateId(3 + u16::from(fdn_index))
}

// ─────────────────────────────────────────────────────────────────
// State id bands (100s per app)
// ─────────────────────────────────────────────────────────────────

pub const QUICKDRAW_STATE_BASE: u16 = 100;
pub const KONAMI_STATE_BASE: u16 = 200;
pub const REGISTRATION_STATE_BASE: u16 = 1000;

/// State id band base for the minigame at FDN index 0..=6 (300s through 900s)
pub fn minigame_state_base(fdn_index: u8) -> u16 {
    debug_assert!(fdn_index < MINIGAME_COUNT);
    300 + u16::from(fdn_index) * 100
}

//! Product logic for the PDN badge firmware
//!
//! Everything above the hardware sits here: who the player is, how two
//! badges duel, and what the duels unlock.
//!
//! ## Identity and progression
//!
//! [`Player`] carries the handle, the hunter/bounty role, and the three
//! progression masks (buttons, hard unlocks, boons). [`ProgressManager`]
//! persists profiles and match history per storage slot.
//!
//! ## Apps
//!
//! [`registration`] runs first boot, [`quickdraw`] is the home app with the
//! beacon/handshake/duel flow, [`konami`] routes won encounters into the
//! progression metagame, and [`minigames`] holds the seven embeddable game
//! apps the metagame launches.
//!
//! ## Assembly
//!
//! [`boot`] wires the full app table onto a [`Device`](pdn_device::Device)
//! and activates quickdraw or registration depending on whether a profile
//! is already on storage.

pub mod boot;
pub mod config;
pub mod difficulty;
pub mod duel;
pub mod konami;
pub mod minigames;
pub mod player;
pub mod progress;
pub mod quickdraw;
pub mod registration;

pub use boot::{boot, boot_with_settings, build_app_config};
pub use config::{load_default_settings, load_settings, Settings};
pub use difficulty::Difficulty;
pub use duel::{shared_matches, MatchManager, MatchOutcome, MatchRecord, SharedMatches};
pub use konami::build_konami_app;
pub use minigames::{
    build_breach_defense_app, build_cipher_path_app, build_exploit_sequencer_app,
    build_firewall_decrypt_app, build_ghost_runner_app, build_signal_echo_app,
    build_spike_vector_app,
};
pub use player::{FdnEncounter, FdnGameType, Player, Role, SharedPlayer};
pub use progress::ProgressManager;
pub use quickdraw::build_quickdraw_app;
pub use registration::build_registration_app;

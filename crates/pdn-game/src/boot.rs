//! Device bring-up: wire the full app table and pick the launch app
//!
//! | app id | machine              |
//! |--------|----------------------|
//! | 0      | registration         |
//! | 1      | quickdraw            |
//! | 2      | konami metagame      |
//! | 3..9   | the seven minigames  |

use std::cell::RefCell;
use std::rc::Rc;

use pdn_core::prelude::*;
use pdn_core::{MINIGAME_COUNT, QUICKDRAW_APP_ID, REGISTRATION_APP_ID};
use pdn_device::{AppConfig, Device};

use crate::config::{load_default_settings, Settings};
use crate::duel::{shared_matches, SharedMatches};
use crate::konami::build_konami_app;
use crate::minigames::{
    build_breach_defense_app, build_cipher_path_app, build_exploit_sequencer_app,
    build_firewall_decrypt_app, build_ghost_runner_app, build_signal_echo_app,
    build_spike_vector_app,
};
use crate::player::{FdnGameType, Player, SharedPlayer};
use crate::progress::ProgressManager;
use crate::quickdraw::build_quickdraw_app;
use crate::registration::build_registration_app;

/// Wire every app the firmware ships
pub fn build_app_config(
    settings: &Settings,
    player: SharedPlayer,
    matches: SharedMatches,
    progress: ProgressManager,
) -> AppConfig {
    let mut config = AppConfig::new();
    config.register(build_registration_app(player.clone(), progress));
    config.register(build_quickdraw_app(
        settings,
        player.clone(),
        matches,
        progress,
    ));
    config.register(build_konami_app(player, progress));
    config.register(build_signal_echo_app());
    config.register(build_ghost_runner_app());
    config.register(build_spike_vector_app());
    config.register(build_firewall_decrypt_app());
    config.register(build_cipher_path_app());
    config.register(build_exploit_sequencer_app());
    config.register(build_breach_defense_app());
    config
}

/// Bring a device up with settings from the platform config dir
pub fn boot(device: &mut Device) {
    let settings = load_default_settings();
    boot_with_settings(device, &settings);
}

/// Load the stored profile (or mint a fresh one), install the app table,
/// and activate quickdraw for a registered device or registration for a
/// fresh one.
pub fn boot_with_settings(device: &mut Device, settings: &Settings) {
    let progress = ProgressManager::new(0);

    let stored = progress.load_player(&device.ctx.storage);
    let registered = stored.is_some();
    let player = stored.unwrap_or_else(|| fresh_player(&device.ctx.device_id));
    info!(handle = %player.handle, registered, "booting");

    let player: SharedPlayer = Rc::new(RefCell::new(player));
    let matches = shared_matches();

    device.load_app_config(build_app_config(settings, player, matches, progress));
    let launch = if registered {
        QUICKDRAW_APP_ID
    } else {
        REGISTRATION_APP_ID
    };
    device.set_active_app(launch);
}

/// A profile for a device that has never registered. The handle and the
/// badge's carried game both derive from the device id so two fresh badges
/// don't come up identical.
fn fresh_player(device_id: &str) -> Player {
    let alnum: Vec<char> = device_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let suffix = if alnum.is_empty() {
        "0000".to_string()
    } else {
        alnum[alnum.len().saturating_sub(4)..]
            .iter()
            .collect::<String>()
            .to_ascii_uppercase()
    };

    let byte_sum: u32 = device_id.bytes().map(u32::from).sum();
    let game_index = (byte_sum % u32::from(MINIGAME_COUNT)) as u8;

    let mut player = Player::new(device_id, format!("OP-{suffix}"));
    player.assigned_game = FdnGameType::from_u8(game_index).unwrap_or(FdnGameType::SignalEcho);
    player
}

//! The Konami progression metagame
//!
//! Entered when a hunter chooses to play the game a beacon carries. A single
//! router state inspects the recorded encounter and the player's progression
//! masks, then jumps straight to the right band:
//!
//! ```text
//! idx 0        KonamiHandshake (dynamic router)
//! idx 1..=7    easy first run, one per game   -> ButtonAwarded | GameOverReturn
//! idx 8..=14   easy replay, one per game      -> GameOverReturn (win unlocks hard)
//! idx 15..=21  hard run, one per game         -> BoonAwarded | GameOverReturn
//! idx 22..=28  mastery menu, one per game     -> easy replay | hard run | GameOverReturn
//! idx 29       ButtonAwarded
//! idx 30       BoonAwarded
//! idx 31       GameOverReturn (terminal, hands back to quickdraw)
//! idx 32       CodeEntry (all seven buttons held)
//! idx 33       CodeAccepted
//! idx 34       CodeRejected
//! ```
//!
//! The launch bands don't host the games themselves; each launch state
//! switches the device to the game's own app and collects the posted
//! outcome when the device switches back.

mod code;
mod handshake;
mod launch;
mod rewards;

use pdn_core::{StateMachine, KONAMI_APP_ID};
use pdn_device::DeviceContext;

use crate::player::{FdnGameType, SharedPlayer};
use crate::progress::ProgressManager;

pub use code::{CodeAcceptedState, CodeEntryState, CodeRejectedState, KONAMI_CODE};
pub use handshake::{calculate_target_state, KonamiHandshakeState};
pub use launch::{GameLaunchState, LaunchMode, MasteryMenuState};
pub use rewards::{BoonAwardedState, ButtonAwardedState, GameOverReturnState};

/// State ids within the Konami band
pub mod ids {
    use pdn_core::{StateId, KONAMI_STATE_BASE};

    pub const HANDSHAKE: StateId = StateId(KONAMI_STATE_BASE);
    pub const BUTTON_AWARDED: StateId = StateId(KONAMI_STATE_BASE + 29);
    pub const BOON_AWARDED: StateId = StateId(KONAMI_STATE_BASE + 30);
    pub const GAME_OVER_RETURN: StateId = StateId(KONAMI_STATE_BASE + 31);
    pub const CODE_ENTRY: StateId = StateId(KONAMI_STATE_BASE + 32);
    pub const CODE_ACCEPTED: StateId = StateId(KONAMI_STATE_BASE + 33);
    pub const CODE_REJECTED: StateId = StateId(KONAMI_STATE_BASE + 34);

    /// Easy first-run launch state for a game index
    pub fn easy_launch(index: u8) -> StateId {
        StateId(KONAMI_STATE_BASE + 1 + u16::from(index))
    }

    /// Easy replay launch state for a game index
    pub fn easy_replay(index: u8) -> StateId {
        StateId(KONAMI_STATE_BASE + 8 + u16::from(index))
    }

    /// Hard-run launch state for a game index
    pub fn hard_launch(index: u8) -> StateId {
        StateId(KONAMI_STATE_BASE + 15 + u16::from(index))
    }

    /// Mastery menu state for a game index
    pub fn mastery_menu(index: u8) -> StateId {
        StateId(KONAMI_STATE_BASE + 22 + u16::from(index))
    }
}

// Machine indices; the bands are laid out contiguously per mode
pub(crate) const IDX_EASY_BASE: usize = 1;
pub(crate) const IDX_REPLAY_BASE: usize = 8;
pub(crate) const IDX_HARD_BASE: usize = 15;
pub(crate) const IDX_MASTERY_BASE: usize = 22;
pub(crate) const IDX_BUTTON_AWARDED: usize = 29;
pub(crate) const IDX_BOON_AWARDED: usize = 30;
pub(crate) const IDX_GAME_OVER: usize = 31;
pub(crate) const IDX_CODE_ENTRY: usize = 32;
pub(crate) const IDX_CODE_ACCEPTED: usize = 33;
pub(crate) const IDX_CODE_REJECTED: usize = 34;

/// Assemble the metagame machine. Band layout must match the index
/// constants above.
pub fn build_konami_app(
    player: SharedPlayer,
    progress: ProgressManager,
) -> StateMachine<DeviceContext> {
    let mut machine = StateMachine::new(KONAMI_APP_ID);
    machine.push_state(Box::new(KonamiHandshakeState::new(player.clone())));
    for game in FdnGameType::MINIGAMES {
        machine.push_state(Box::new(GameLaunchState::new(
            LaunchMode::EasyFirst,
            game,
            player.clone(),
            progress,
        )));
    }
    for game in FdnGameType::MINIGAMES {
        machine.push_state(Box::new(GameLaunchState::new(
            LaunchMode::EasyReplay,
            game,
            player.clone(),
            progress,
        )));
    }
    for game in FdnGameType::MINIGAMES {
        machine.push_state(Box::new(GameLaunchState::new(
            LaunchMode::Hard,
            game,
            player.clone(),
            progress,
        )));
    }
    for game in FdnGameType::MINIGAMES {
        machine.push_state(Box::new(MasteryMenuState::new(game)));
    }
    machine.push_state(Box::new(ButtonAwardedState::new(
        player.clone(),
        progress,
    )));
    machine.push_state(Box::new(BoonAwardedState::new(player.clone(), progress)));
    machine.push_state(Box::new(GameOverReturnState::new()));
    machine.push_state(Box::new(CodeEntryState::new()));
    machine.push_state(Box::new(CodeAcceptedState::new(player, progress)));
    machine.push_state(Box::new(CodeRejectedState::new()));
    machine
}

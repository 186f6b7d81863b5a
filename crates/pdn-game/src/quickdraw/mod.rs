//! The quickdraw app: beacon, handshake, duel, results
//!
//! This is the device's home app. A bounty broadcasts its FDN beacon while
//! idle; a hunter that hears one gets a detect screen offering a duel or a
//! run at the carried minigame. Choosing the duel walks both devices through
//! an id exchange, a synchronized countdown, and the draw itself, then both
//! settle the outcome locally from the exchanged reaction times.
//!
//! State map (indices are machine positions, ids live in the 100 band):
//!
//! | idx | state               | leaves for                          |
//! |-----|---------------------|-------------------------------------|
//! | 0   | Idle                | ColorPicker, FdnDetected, Handshake, Sleep |
//! | 1   | ColorPicker         | Idle                                |
//! | 2   | FdnDetected         | Handshake, Idle                     |
//! | 3   | HandshakeInitiate   | BountySendCc, HunterSendId, Idle    |
//! | 4   | BountySendCc        | ConnectionSuccessful, Idle          |
//! | 5   | HunterSendId        | ConnectionSuccessful, Idle          |
//! | 6   | ConnectionSuccessful| DuelCountdown, Idle                 |
//! | 7   | DuelCountdown       | Duel, Idle                          |
//! | 8   | Duel                | DuelPushed, DuelReceivedResult, Idle|
//! | 9   | DuelPushed          | DuelResult, Idle                    |
//! | 10  | DuelReceivedResult  | DuelResult, Idle                    |
//! | 11  | DuelResult          | Win, Lose, Idle                     |
//! | 12  | Win                 | UploadMatches                       |
//! | 13  | Lose                | UploadMatches                       |
//! | 14  | UploadMatches       | Idle                                |
//! | 15  | Sleep               | Awaken                              |
//! | 16  | Awaken              | Idle                                |

mod handshake;
mod idle;
mod results;
mod showdown;

use pdn_core::{StateMachine, QUICKDRAW_APP_ID};
use pdn_device::DeviceContext;

use crate::config::Settings;
use crate::duel::SharedMatches;
use crate::player::SharedPlayer;
use crate::progress::ProgressManager;

pub use handshake::{
    BountySendCcState, ConnectionSuccessfulState, FdnDetectedState, HandshakeInitiateState,
    HunterSendIdState,
};
pub use idle::{AwakenState, ColorPickerState, IdleState, SleepState};
pub use results::{DuelResultState, LoseState, UploadMatchesState, WinState};
pub use showdown::{DuelCountdownState, DuelPushedState, DuelReceivedResultState, DuelState};

/// State ids within the quickdraw band
pub mod ids {
    use pdn_core::{StateId, QUICKDRAW_STATE_BASE};

    pub const IDLE: StateId = StateId(QUICKDRAW_STATE_BASE);
    pub const COLOR_PICKER: StateId = StateId(QUICKDRAW_STATE_BASE + 1);
    pub const FDN_DETECTED: StateId = StateId(QUICKDRAW_STATE_BASE + 2);
    pub const HANDSHAKE_INITIATE: StateId = StateId(QUICKDRAW_STATE_BASE + 3);
    pub const BOUNTY_SEND_CC: StateId = StateId(QUICKDRAW_STATE_BASE + 4);
    pub const HUNTER_SEND_ID: StateId = StateId(QUICKDRAW_STATE_BASE + 5);
    pub const CONNECTION_SUCCESSFUL: StateId = StateId(QUICKDRAW_STATE_BASE + 6);
    pub const DUEL_COUNTDOWN: StateId = StateId(QUICKDRAW_STATE_BASE + 7);
    pub const DUEL: StateId = StateId(QUICKDRAW_STATE_BASE + 8);
    pub const DUEL_PUSHED: StateId = StateId(QUICKDRAW_STATE_BASE + 9);
    pub const DUEL_RECEIVED_RESULT: StateId = StateId(QUICKDRAW_STATE_BASE + 10);
    pub const DUEL_RESULT: StateId = StateId(QUICKDRAW_STATE_BASE + 11);
    pub const WIN: StateId = StateId(QUICKDRAW_STATE_BASE + 12);
    pub const LOSE: StateId = StateId(QUICKDRAW_STATE_BASE + 13);
    pub const UPLOAD_MATCHES: StateId = StateId(QUICKDRAW_STATE_BASE + 14);
    pub const SLEEP: StateId = StateId(QUICKDRAW_STATE_BASE + 15);
    pub const AWAKEN: StateId = StateId(QUICKDRAW_STATE_BASE + 16);
}

// Machine indices, used by the states to wire their transitions
pub(crate) const IDX_IDLE: usize = 0;
pub(crate) const IDX_COLOR_PICKER: usize = 1;
pub(crate) const IDX_FDN_DETECTED: usize = 2;
pub(crate) const IDX_HANDSHAKE_INITIATE: usize = 3;
pub(crate) const IDX_BOUNTY_SEND_CC: usize = 4;
pub(crate) const IDX_HUNTER_SEND_ID: usize = 5;
pub(crate) const IDX_CONNECTION_SUCCESSFUL: usize = 6;
pub(crate) const IDX_DUEL_COUNTDOWN: usize = 7;
pub(crate) const IDX_DUEL: usize = 8;
pub(crate) const IDX_DUEL_PUSHED: usize = 9;
pub(crate) const IDX_DUEL_RECEIVED_RESULT: usize = 10;
pub(crate) const IDX_DUEL_RESULT: usize = 11;
pub(crate) const IDX_WIN: usize = 12;
pub(crate) const IDX_LOSE: usize = 13;
pub(crate) const IDX_UPLOAD_MATCHES: usize = 14;
pub(crate) const IDX_SLEEP: usize = 15;
pub(crate) const IDX_AWAKEN: usize = 16;

/// Assemble the quickdraw machine. Push order must match the index table
/// above; the transitions are wired by position.
pub fn build_quickdraw_app(
    settings: &Settings,
    player: SharedPlayer,
    matches: SharedMatches,
    progress: ProgressManager,
) -> StateMachine<DeviceContext> {
    let mut machine = StateMachine::new(QUICKDRAW_APP_ID);
    machine.push_state(Box::new(IdleState::new(settings, player.clone())));
    machine.push_state(Box::new(ColorPickerState::new(player.clone(), progress)));
    machine.push_state(Box::new(FdnDetectedState::new(settings, player.clone())));
    machine.push_state(Box::new(HandshakeInitiateState::new(
        settings,
        player.clone(),
    )));
    machine.push_state(Box::new(BountySendCcState::new(settings, matches.clone())));
    machine.push_state(Box::new(HunterSendIdState::new(settings, matches.clone())));
    machine.push_state(Box::new(ConnectionSuccessfulState::new(
        settings,
        matches.clone(),
    )));
    machine.push_state(Box::new(DuelCountdownState::new(
        settings,
        player.clone(),
        matches.clone(),
    )));
    machine.push_state(Box::new(DuelState::new(settings, matches.clone())));
    machine.push_state(Box::new(DuelPushedState::new(settings, matches.clone())));
    machine.push_state(Box::new(DuelReceivedResultState::new(matches.clone())));
    machine.push_state(Box::new(DuelResultState::new(
        player.clone(),
        matches.clone(),
    )));
    machine.push_state(Box::new(WinState::new(
        settings,
        player.clone(),
        matches.clone(),
    )));
    machine.push_state(Box::new(LoseState::new(settings)));
    machine.push_state(Box::new(UploadMatchesState::new(
        player.clone(),
        matches,
        progress,
    )));
    machine.push_state(Box::new(SleepState::new()));
    machine.push_state(Box::new(AwakenState::new(player)));
    machine
}

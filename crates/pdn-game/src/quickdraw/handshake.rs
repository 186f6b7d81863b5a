//! Detect screen and the id-exchange beats
//!
//! Wire choreography, hunter on the left, bounty on the right:
//!
//! ```text
//! (idle)          <── Fdn ──           (idle, beaconing)
//!      ── Fack ──>
//! (FdnDetected, player chooses)        (HandshakeInitiate)
//!                 <── ConnectionConfirmed ──
//!      ── HunterId ──>
//! (ConnectionSuccessful)               (ConnectionSuccessful)
//! ```
//!
//! The bounty's ConnectionConfirmed sits in the hunter's inbound queue while
//! the detect screen waits on the player; HunterSendId picks it up whenever
//! the duel is chosen. If the hunter goes off to play the minigame instead,
//! the bounty's wait simply times out back to idle.

use serde::{Deserialize, Serialize};

use pdn_core::prelude::*;
use pdn_core::{Flag, Snapshot, State, StateId, StateTransition, Timer};
use pdn_device::drivers::{AnimationConfig, AnimationKind, Button, ButtonInteraction};
use pdn_device::{DeviceContext, Message};

use crate::config::Settings;
use crate::duel::SharedMatches;
use crate::player::{Role, SharedPlayer};

use super::{
    ids, IDX_BOUNTY_SEND_CC, IDX_CONNECTION_SUCCESSFUL, IDX_DUEL_COUNTDOWN,
    IDX_HANDSHAKE_INITIATE, IDX_HUNTER_SEND_ID, IDX_IDLE,
};

const DETECT_BUZZ_MS: u64 = 200;

// ─────────────────────────────────────────────────────────────────
// FdnDetected
// ─────────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct FdnDetectedSnapshot {
    launched: bool,
}

/// Hunter-side detect screen: answer the beacon, then let the player pick
/// between calling the duel and playing the carried minigame.
pub struct FdnDetectedState {
    id: StateId,
    player: SharedPlayer,
    decision_timeout_ms: u64,
    decision: Timer,
    buzz: Timer,
    launched: bool,
    to_handshake: Flag,
    to_idle: Flag,
    transitions: Vec<StateTransition>,
}

impl FdnDetectedState {
    pub fn new(settings: &Settings, player: SharedPlayer) -> Self {
        let to_handshake = Flag::new();
        let to_idle = Flag::new();
        let transitions = vec![
            StateTransition::when(&to_handshake, IDX_HANDSHAKE_INITIATE),
            StateTransition::when(&to_idle, IDX_IDLE),
        ];
        Self {
            id: ids::FDN_DETECTED,
            player,
            decision_timeout_ms: settings.handshake.fdn_decision_timeout_ms,
            decision: Timer::new(),
            buzz: Timer::new(),
            launched: false,
            to_handshake,
            to_idle,
            transitions,
        }
    }
}

impl State<DeviceContext> for FdnDetectedState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.to_handshake.lower();
        self.to_idle.lower();
        self.launched = false;

        ctx.buttons.claim(self.id);

        if let Err(err) = ctx.link.send(&Message::Fack) {
            warn!(%err, "could not answer the beacon");
        }

        let now = ctx.now_ms();
        self.decision.start(now, self.decision_timeout_ms);
        self.buzz.start(now, DETECT_BUZZ_MS);
        ctx.haptics.set_intensity(120);
        ctx.lights
            .start(AnimationConfig::looped(AnimationKind::Pulse));

        let (game_name, peer_buttons) = match self.player.borrow().last_fdn {
            Some(encounter) => (encounter.game.name(), encounter.peer_buttons.count_ones()),
            None => ("UNKNOWN", 0),
        };
        ctx.display.clear();
        ctx.display.draw_centered_text(6, "FDN DETECTED");
        ctx.display.draw_centered_text(22, game_name);
        ctx.display
            .draw_centered_text(36, format!("TARGET HOLDS {} BTNS", peer_buttons));
        ctx.display.draw_centered_text(52, "[P] DUEL  [S] PLAY");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        let now = ctx.now_ms();
        if self.buzz.expired(now) {
            ctx.haptics.off();
            self.buzz.invalidate();
        }

        while let Some(press) = ctx.buttons.take_press(self.id) {
            if press.interaction != ButtonInteraction::Click {
                continue;
            }
            match press.button {
                Button::Primary => {
                    info!("duel called");
                    self.to_handshake.raise();
                }
                Button::Secondary => {
                    info!("minigame chosen over the duel");
                    self.launched = true;
                    ctx.request_app_switch(pdn_core::KONAMI_APP_ID);
                }
            }
        }

        if !ctx.link.is_connected() || self.decision.expired(now) {
            self.to_idle.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id);
        ctx.lights.stop();
        ctx.haptics.off();
        self.decision.invalidate();
        self.buzz.invalidate();
    }

    fn on_paused(&mut self, ctx: &mut DeviceContext) -> Option<Snapshot> {
        ctx.haptics.off();
        ctx.lights.stop();
        Snapshot::capture(
            self.id,
            &FdnDetectedSnapshot {
                launched: self.launched,
            },
        )
    }

    fn on_resumed(&mut self, _ctx: &mut DeviceContext, snapshot: Option<Snapshot>) {
        let launched = snapshot
            .and_then(|snap| snap.restore::<FdnDetectedSnapshot>(self.id))
            .map(|snap| snap.launched)
            .unwrap_or(false);
        if launched {
            debug!("back from the metagame, returning to idle");
        }
        // the encounter is stale either way
        self.to_idle.raise();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// HandshakeInitiate
// ─────────────────────────────────────────────────────────────────

/// One-beat role branch into the two send states
pub struct HandshakeInitiateState {
    id: StateId,
    player: SharedPlayer,
    response_timeout_ms: u64,
    timeout: Timer,
    bounty_branch: Flag,
    hunter_branch: Flag,
    to_idle: Flag,
    transitions: Vec<StateTransition>,
}

impl HandshakeInitiateState {
    pub fn new(settings: &Settings, player: SharedPlayer) -> Self {
        let bounty_branch = Flag::new();
        let hunter_branch = Flag::new();
        let to_idle = Flag::new();
        let transitions = vec![
            StateTransition::when(&bounty_branch, IDX_BOUNTY_SEND_CC),
            StateTransition::when(&hunter_branch, IDX_HUNTER_SEND_ID),
            StateTransition::when(&to_idle, IDX_IDLE),
        ];
        Self {
            id: ids::HANDSHAKE_INITIATE,
            player,
            response_timeout_ms: settings.handshake.response_timeout_ms,
            timeout: Timer::new(),
            bounty_branch,
            hunter_branch,
            to_idle,
            transitions,
        }
    }
}

impl State<DeviceContext> for HandshakeInitiateState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.bounty_branch.lower();
        self.hunter_branch.lower();
        self.to_idle.lower();
        self.timeout.start(ctx.now_ms(), self.response_timeout_ms);
        ctx.display.clear();
        ctx.display.draw_centered_text(28, "LINKING...");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if !ctx.link.is_connected() || self.timeout.expired(ctx.now_ms()) {
            self.to_idle.raise();
            return;
        }
        match self.player.borrow().role {
            Role::Bounty => self.bounty_branch.raise(),
            Role::Hunter => self.hunter_branch.raise(),
        }
    }

    fn on_dismounted(&mut self, _ctx: &mut DeviceContext) {
        self.timeout.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// BountySendCc
// ─────────────────────────────────────────────────────────────────

/// Bounty side: announce our id, wait for the hunter's
pub struct BountySendCcState {
    id: StateId,
    matches: SharedMatches,
    response_timeout_ms: u64,
    timeout: Timer,
    connected: Flag,
    to_idle: Flag,
    transitions: Vec<StateTransition>,
}

impl BountySendCcState {
    pub fn new(settings: &Settings, matches: SharedMatches) -> Self {
        let connected = Flag::new();
        let to_idle = Flag::new();
        let transitions = vec![
            StateTransition::when(&connected, IDX_CONNECTION_SUCCESSFUL),
            StateTransition::when(&to_idle, IDX_IDLE),
        ];
        Self {
            id: ids::BOUNTY_SEND_CC,
            matches,
            response_timeout_ms: settings.handshake.response_timeout_ms,
            timeout: Timer::new(),
            connected,
            to_idle,
            transitions,
        }
    }
}

impl State<DeviceContext> for BountySendCcState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.connected.lower();
        self.to_idle.lower();

        let announce = Message::ConnectionConfirmed {
            peer: ctx.device_id.clone(),
        };
        if let Err(err) = ctx.link.send(&announce) {
            warn!(%err, "connection announce failed");
            self.to_idle.raise();
        }
        self.timeout.start(ctx.now_ms(), self.response_timeout_ms);

        ctx.display.clear();
        ctx.display.draw_centered_text(28, "CONFIRMING...");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if !ctx.link.is_connected() {
            self.to_idle.raise();
            return;
        }
        while let Some(message) = ctx.link.recv() {
            match message {
                Message::HunterId { peer } => {
                    info!(%peer, "hunter identified, match on");
                    self.matches.borrow_mut().begin(peer, Role::Bounty);
                    self.connected.raise();
                }
                other => trace!(?other, "message ignored while confirming"),
            }
        }
        if self.timeout.expired(ctx.now_ms()) {
            debug!("hunter never answered, dropping back to idle");
            self.to_idle.raise();
        }
    }

    fn on_dismounted(&mut self, _ctx: &mut DeviceContext) {
        self.timeout.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// HunterSendId
// ─────────────────────────────────────────────────────────────────

/// Hunter side: wait for the bounty's announce, reply with our id
pub struct HunterSendIdState {
    id: StateId,
    matches: SharedMatches,
    response_timeout_ms: u64,
    timeout: Timer,
    connected: Flag,
    to_idle: Flag,
    transitions: Vec<StateTransition>,
}

impl HunterSendIdState {
    pub fn new(settings: &Settings, matches: SharedMatches) -> Self {
        let connected = Flag::new();
        let to_idle = Flag::new();
        let transitions = vec![
            StateTransition::when(&connected, IDX_CONNECTION_SUCCESSFUL),
            StateTransition::when(&to_idle, IDX_IDLE),
        ];
        Self {
            id: ids::HUNTER_SEND_ID,
            matches,
            response_timeout_ms: settings.handshake.response_timeout_ms,
            timeout: Timer::new(),
            connected,
            to_idle,
            transitions,
        }
    }
}

impl State<DeviceContext> for HunterSendIdState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.connected.lower();
        self.to_idle.lower();
        self.timeout.start(ctx.now_ms(), self.response_timeout_ms);
        ctx.display.clear();
        ctx.display.draw_centered_text(28, "AWAITING TARGET...");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if !ctx.link.is_connected() {
            self.to_idle.raise();
            return;
        }
        while let Some(message) = ctx.link.recv() {
            match message {
                Message::ConnectionConfirmed { peer } => {
                    let reply = Message::HunterId {
                        peer: ctx.device_id.clone(),
                    };
                    if let Err(err) = ctx.link.send(&reply) {
                        warn!(%err, "id reply failed");
                        self.to_idle.raise();
                        return;
                    }
                    info!(%peer, "target confirmed, match on");
                    self.matches.borrow_mut().begin(peer, Role::Hunter);
                    self.connected.raise();
                }
                other => trace!(?other, "message ignored while waiting for confirm"),
            }
        }
        if self.timeout.expired(ctx.now_ms()) {
            debug!("no confirm from the target, dropping back to idle");
            self.to_idle.raise();
        }
    }

    fn on_dismounted(&mut self, _ctx: &mut DeviceContext) {
        self.timeout.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// ConnectionSuccessful
// ─────────────────────────────────────────────────────────────────

/// Short shared beat before the countdown so both screens land together
pub struct ConnectionSuccessfulState {
    id: StateId,
    matches: SharedMatches,
    beat_ms: u64,
    beat: Timer,
    to_countdown: Flag,
    to_idle: Flag,
    transitions: Vec<StateTransition>,
}

impl ConnectionSuccessfulState {
    pub fn new(settings: &Settings, matches: SharedMatches) -> Self {
        let to_countdown = Flag::new();
        let to_idle = Flag::new();
        let transitions = vec![
            StateTransition::when(&to_countdown, IDX_DUEL_COUNTDOWN),
            StateTransition::when(&to_idle, IDX_IDLE),
        ];
        Self {
            id: ids::CONNECTION_SUCCESSFUL,
            matches,
            beat_ms: settings.handshake.connected_beat_ms,
            beat: Timer::new(),
            to_countdown,
            to_idle,
            transitions,
        }
    }
}

impl State<DeviceContext> for ConnectionSuccessfulState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.to_countdown.lower();
        self.to_idle.lower();
        self.beat.start(ctx.now_ms(), self.beat_ms);

        let peer = self
            .matches
            .borrow()
            .current()
            .map(|m| m.peer.clone())
            .unwrap_or_default();
        ctx.display.clear();
        ctx.display.draw_centered_text(20, "LINK ESTABLISHED");
        ctx.display.draw_centered_text(38, format!("VS {}", peer));
        ctx.display.render();
        ctx.lights
            .start(AnimationConfig::new(AnimationKind::Pulse));
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if !ctx.link.is_connected() {
            self.matches.borrow_mut().abandon();
            self.to_idle.raise();
            return;
        }
        if self.beat.expired(ctx.now_ms()) {
            self.to_countdown.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.lights.stop();
        self.beat.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

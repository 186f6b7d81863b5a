//! Countdown and the draw window
//!
//! The hunter opens the countdown on both devices with a CountdownStart; each
//! side then measures reactions against its own clock from the moment its
//! window opens. Resolution never trusts one side's opinion of the other:
//! a press made before seeing any peer traffic travels as DuelPress with the
//! measured reaction, while a press made after the peer's shot has already
//! arrived travels as DuelConcede. Both devices therefore settle the same
//! outcome from the same facts, tie going to the hunter.

use pdn_core::prelude::*;
use pdn_core::{Flag, State, StateId, StateTransition, Timer};
use pdn_device::drivers::{AnimationConfig, AnimationKind, Button, ButtonInteraction};
use pdn_device::{DeviceContext, Message};

use crate::config::Settings;
use crate::duel::SharedMatches;
use crate::player::{Role, SharedPlayer};

use super::{ids, IDX_DUEL, IDX_DUEL_PUSHED, IDX_DUEL_RECEIVED_RESULT, IDX_DUEL_RESULT, IDX_IDLE};

/// How long the "return fire" screen waits before conceding on its own
const RETURN_FIRE_GRACE_MS: u64 = 2000;
const DRAW_BUZZ_MS: u64 = 150;

// ─────────────────────────────────────────────────────────────────
// DuelCountdown
// ─────────────────────────────────────────────────────────────────

/// Synchronized countdown. The hunter announces the duration and both sides
/// run it locally; the bounty goes back to idle if the announce never comes.
pub struct DuelCountdownState {
    id: StateId,
    player: SharedPlayer,
    matches: SharedMatches,
    countdown_ms: u64,
    response_timeout_ms: u64,
    countdown: Timer,
    wait: Timer,
    armed: bool,
    drawn_second: Option<u64>,
    to_duel: Flag,
    to_idle: Flag,
    transitions: Vec<StateTransition>,
}

impl DuelCountdownState {
    pub fn new(settings: &Settings, player: SharedPlayer, matches: SharedMatches) -> Self {
        let to_duel = Flag::new();
        let to_idle = Flag::new();
        let transitions = vec![
            StateTransition::when(&to_duel, IDX_DUEL),
            StateTransition::when(&to_idle, IDX_IDLE),
        ];
        Self {
            id: ids::DUEL_COUNTDOWN,
            player,
            matches,
            countdown_ms: settings.duel.countdown_ms,
            response_timeout_ms: settings.handshake.response_timeout_ms,
            countdown: Timer::new(),
            wait: Timer::new(),
            armed: false,
            drawn_second: None,
            to_duel,
            to_idle,
            transitions,
        }
    }

    fn draw_seconds(&mut self, ctx: &mut DeviceContext, now: u64) {
        let second = self.countdown.remaining(now) / 1000 + 1;
        if self.drawn_second == Some(second) {
            return;
        }
        self.drawn_second = Some(second);
        ctx.display.clear();
        ctx.display.draw_centered_text(16, "STEADY...");
        ctx.display.draw_centered_text(36, format!("{}", second));
        ctx.display.render();
    }

    fn bail_to_idle(&mut self) {
        self.matches.borrow_mut().abandon();
        self.to_idle.raise();
    }
}

impl State<DeviceContext> for DuelCountdownState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.to_duel.lower();
        self.to_idle.lower();
        self.armed = false;
        self.drawn_second = None;

        let now = ctx.now_ms();
        let role = self.player.borrow().role;
        match role {
            Role::Hunter => {
                let start = Message::CountdownStart {
                    duration_ms: self.countdown_ms,
                };
                if let Err(err) = ctx.link.send(&start) {
                    warn!(%err, "countdown announce failed");
                    self.bail_to_idle();
                    return;
                }
                self.countdown.start(now, self.countdown_ms);
                self.armed = true;
            }
            Role::Bounty => {
                self.wait.start(now, self.response_timeout_ms);
            }
        }

        ctx.display.clear();
        ctx.display.draw_centered_text(28, "GET READY");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        let now = ctx.now_ms();
        if !ctx.link.is_connected() {
            self.bail_to_idle();
            return;
        }

        while let Some(message) = ctx.link.recv() {
            match message {
                Message::CountdownStart { duration_ms } if !self.armed => {
                    debug!(duration_ms, "countdown armed by the hunter");
                    self.countdown.start(now, duration_ms);
                    self.wait.invalidate();
                    self.armed = true;
                }
                other => trace!(?other, "message ignored during countdown"),
            }
        }

        if !self.armed {
            if self.wait.expired(now) {
                debug!("countdown never arrived, dropping back to idle");
                self.bail_to_idle();
            }
            return;
        }

        if self.countdown.expired(now) {
            // shall we battle: only with the cable still in
            if ctx.link.is_connected() {
                self.to_duel.raise();
            } else {
                self.bail_to_idle();
            }
        } else {
            self.draw_seconds(ctx, now);
        }
    }

    fn on_dismounted(&mut self, _ctx: &mut DeviceContext) {
        self.countdown.invalidate();
        self.wait.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// Duel
// ─────────────────────────────────────────────────────────────────

/// The open draw window. First local press sends our reaction and moves to
/// DuelPushed; a peer press arriving first moves to DuelReceivedResult.
pub struct DuelState {
    id: StateId,
    matches: SharedMatches,
    window_timeout_ms: u64,
    window: Timer,
    buzz: Timer,
    pushed: Flag,
    received: Flag,
    to_idle: Flag,
    transitions: Vec<StateTransition>,
}

impl DuelState {
    pub fn new(settings: &Settings, matches: SharedMatches) -> Self {
        let pushed = Flag::new();
        let received = Flag::new();
        let to_idle = Flag::new();
        let transitions = vec![
            StateTransition::when(&pushed, IDX_DUEL_PUSHED),
            StateTransition::when(&received, IDX_DUEL_RECEIVED_RESULT),
            StateTransition::when(&to_idle, IDX_IDLE),
        ];
        Self {
            id: ids::DUEL,
            matches,
            window_timeout_ms: settings.duel.window_timeout_ms,
            window: Timer::new(),
            buzz: Timer::new(),
            pushed,
            received,
            to_idle,
            transitions,
        }
    }
}

impl State<DeviceContext> for DuelState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.pushed.lower();
        self.received.lower();
        self.to_idle.lower();

        ctx.buttons.claim(self.id);
        let now = ctx.now_ms();
        self.matches.borrow_mut().open_window(now);
        self.window.start(now, self.window_timeout_ms);
        self.buzz.start(now, DRAW_BUZZ_MS);
        ctx.haptics.set_intensity(200);
        ctx.lights
            .start(AnimationConfig::looped(AnimationKind::Strobe));
        ctx.display.clear();
        ctx.display.draw_centered_text(28, "DRAW!!");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        let now = ctx.now_ms();
        if self.buzz.expired(now) {
            ctx.haptics.off();
            self.buzz.invalidate();
        }

        if !ctx.link.is_connected() {
            self.matches.borrow_mut().abandon();
            self.to_idle.raise();
            return;
        }

        while let Some(press) = ctx.buttons.take_press(self.id) {
            if press.button == Button::Primary && press.interaction == ButtonInteraction::Click {
                let reaction = self
                    .matches
                    .borrow()
                    .reaction_since_window(now)
                    .unwrap_or(0);
                self.matches.borrow_mut().record_my_reaction(reaction);
                let shot = Message::DuelPress {
                    reaction_ms: reaction,
                };
                if let Err(err) = ctx.link.send(&shot) {
                    warn!(%err, "shot never left the device");
                }
                info!(reaction_ms = reaction, "drew");
                self.pushed.raise();
                // leave any queued traffic for the next state
                return;
            }
        }

        while let Some(message) = ctx.link.recv() {
            match message {
                Message::DuelPress { reaction_ms } => {
                    info!(peer_reaction_ms = reaction_ms, "peer drew first");
                    self.matches.borrow_mut().record_peer_reaction(reaction_ms);
                    self.received.raise();
                    return;
                }
                other => trace!(?other, "message ignored in the draw window"),
            }
        }

        if self.window.expired(now) {
            debug!("draw window closed with no shots");
            self.matches.borrow_mut().abandon();
            self.to_idle.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id);
        ctx.lights.stop();
        ctx.haptics.off();
        self.window.invalidate();
        self.buzz.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// DuelPushed
// ─────────────────────────────────────────────────────────────────

/// We fired; wait for the peer's shot or concession
pub struct DuelPushedState {
    id: StateId,
    matches: SharedMatches,
    window_timeout_ms: u64,
    window: Timer,
    result_ready: Flag,
    to_idle: Flag,
    transitions: Vec<StateTransition>,
}

impl DuelPushedState {
    pub fn new(settings: &Settings, matches: SharedMatches) -> Self {
        let result_ready = Flag::new();
        let to_idle = Flag::new();
        let transitions = vec![
            StateTransition::when(&result_ready, IDX_DUEL_RESULT),
            StateTransition::when(&to_idle, IDX_IDLE),
        ];
        Self {
            id: ids::DUEL_PUSHED,
            matches,
            window_timeout_ms: settings.duel.window_timeout_ms,
            window: Timer::new(),
            result_ready,
            to_idle,
            transitions,
        }
    }
}

impl State<DeviceContext> for DuelPushedState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.result_ready.lower();
        self.to_idle.lower();
        self.window.start(ctx.now_ms(), self.window_timeout_ms);

        let reaction = self
            .matches
            .borrow()
            .current()
            .and_then(|m| m.my_reaction_ms)
            .unwrap_or(0);
        ctx.display.clear();
        ctx.display.draw_centered_text(20, "SHOT FIRED");
        ctx.display
            .draw_centered_text(38, format!("{} MS", reaction));
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if !ctx.link.is_connected() {
            self.matches.borrow_mut().abandon();
            self.to_idle.raise();
            return;
        }

        while let Some(message) = ctx.link.recv() {
            match message {
                Message::DuelPress { reaction_ms } => {
                    debug!(peer_reaction_ms = reaction_ms, "both sides fired");
                    self.matches.borrow_mut().record_peer_reaction(reaction_ms);
                    self.result_ready.raise();
                }
                Message::DuelConcede => {
                    debug!("peer conceded");
                    self.matches.borrow_mut().record_peer_concede();
                    self.result_ready.raise();
                }
                other => trace!(?other, "message ignored after firing"),
            }
        }

        if self.window.expired(ctx.now_ms()) {
            debug!("peer went quiet after our shot");
            self.matches.borrow_mut().abandon();
            self.to_idle.raise();
        }
    }

    fn on_dismounted(&mut self, _ctx: &mut DeviceContext) {
        self.window.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// DuelReceivedResult
// ─────────────────────────────────────────────────────────────────

/// The peer fired before we did. The draw is lost; a press here only
/// acknowledges, and silence concedes on its own after a short grace.
pub struct DuelReceivedResultState {
    id: StateId,
    matches: SharedMatches,
    grace: Timer,
    buzz: Timer,
    result_ready: Flag,
    to_idle: Flag,
    transitions: Vec<StateTransition>,
}

impl DuelReceivedResultState {
    pub fn new(matches: SharedMatches) -> Self {
        let result_ready = Flag::new();
        let to_idle = Flag::new();
        let transitions = vec![
            StateTransition::when(&result_ready, IDX_DUEL_RESULT),
            StateTransition::when(&to_idle, IDX_IDLE),
        ];
        Self {
            id: ids::DUEL_RECEIVED_RESULT,
            matches,
            grace: Timer::new(),
            buzz: Timer::new(),
            result_ready,
            to_idle,
            transitions,
        }
    }

    fn concede(&mut self, ctx: &mut DeviceContext) {
        self.matches.borrow_mut().record_my_concede();
        if let Err(err) = ctx.link.send(&Message::DuelConcede) {
            debug!(%err, "concession not delivered");
        }
        self.result_ready.raise();
    }
}

impl State<DeviceContext> for DuelReceivedResultState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.result_ready.lower();
        self.to_idle.lower();

        ctx.buttons.claim(self.id);
        let now = ctx.now_ms();
        self.grace.start(now, RETURN_FIRE_GRACE_MS);
        self.buzz.start(now, DRAW_BUZZ_MS);
        ctx.haptics.set_intensity(180);
        ctx.display.clear();
        ctx.display.draw_centered_text(20, "TARGET FIRED");
        ctx.display.draw_centered_text(38, "RETURN!");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        let now = ctx.now_ms();
        if self.buzz.expired(now) {
            ctx.haptics.off();
            self.buzz.invalidate();
        }

        if !ctx.link.is_connected() {
            self.matches.borrow_mut().abandon();
            self.to_idle.raise();
            return;
        }

        while let Some(press) = ctx.buttons.take_press(self.id) {
            if press.button == Button::Primary && press.interaction == ButtonInteraction::Click {
                let reaction = self
                    .matches
                    .borrow()
                    .reaction_since_window(now)
                    .unwrap_or(0);
                self.matches.borrow_mut().record_my_reaction(reaction);
                self.concede(ctx);
                return;
            }
        }

        if self.grace.expired(now) {
            debug!("no return fire, conceding");
            self.concede(ctx);
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id);
        ctx.haptics.off();
        self.grace.invalidate();
        self.buzz.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

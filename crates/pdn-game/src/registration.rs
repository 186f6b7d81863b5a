//! First-boot registration: pick a role, persist the profile
//!
//! Three states in the 1000 band: Welcome (any press to begin), RoleSelect
//! (primary hunts, secondary gets hunted), Complete (saves the profile and
//! hands the device to the quickdraw app). A device that already carries a
//! stored profile skips from Welcome straight to Complete so re-entering the
//! app never asks the questions twice.

use pdn_core::prelude::*;
use pdn_core::{
    Flag, State, StateId, StateMachine, StateTransition, Timer, QUICKDRAW_APP_ID,
    REGISTRATION_APP_ID,
};
use pdn_device::drivers::{AnimationConfig, AnimationKind, Button};
use pdn_device::DeviceContext;

use crate::player::{Role, SharedPlayer};
use crate::progress::ProgressManager;

/// State ids within the registration band
pub mod ids {
    use pdn_core::{StateId, REGISTRATION_STATE_BASE};

    pub const WELCOME: StateId = StateId(REGISTRATION_STATE_BASE);
    pub const ROLE_SELECT: StateId = StateId(REGISTRATION_STATE_BASE + 1);
    pub const COMPLETE: StateId = StateId(REGISTRATION_STATE_BASE + 2);
}

const IDX_ROLE_SELECT: usize = 1;
const IDX_COMPLETE: usize = 2;

const HANDOFF_DWELL_MS: u64 = 1500;

// ─────────────────────────────────────────────────────────────────
// Welcome
// ─────────────────────────────────────────────────────────────────

/// Boot splash. Any press moves on; a profile already on storage skips the
/// questions entirely.
pub struct WelcomeState {
    id: StateId,
    progress: ProgressManager,
    to_select: Flag,
    to_complete: Flag,
    transitions: Vec<StateTransition>,
}

impl WelcomeState {
    pub fn new(progress: ProgressManager) -> Self {
        let to_select = Flag::new();
        let to_complete = Flag::new();
        // the skip outranks a press landing on the same tick
        let transitions = vec![
            StateTransition::when(&to_complete, IDX_COMPLETE),
            StateTransition::when(&to_select, IDX_ROLE_SELECT),
        ];
        Self {
            id: ids::WELCOME,
            progress,
            to_select,
            to_complete,
            transitions,
        }
    }
}

impl State<DeviceContext> for WelcomeState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.to_select.lower();
        self.to_complete.lower();
        ctx.buttons.claim(self.id);

        if self.progress.load_player(&ctx.storage).is_some() {
            debug!("profile already on storage, skipping registration");
            self.to_complete.raise();
            return;
        }

        ctx.lights
            .start(AnimationConfig::looped(AnimationKind::Idle));
        ctx.display.clear();
        ctx.display.draw_centered_text(12, "PDN ONLINE");
        ctx.display.draw_centered_text(30, "NEW OPERATIVE");
        ctx.display.draw_centered_text(52, "PRESS TO BEGIN");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if ctx.buttons.take_press(self.id).is_some() {
            self.to_select.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id);
        ctx.lights.stop();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// RoleSelect
// ─────────────────────────────────────────────────────────────────

/// Primary claims the hunter role, secondary the bounty
pub struct RoleSelectState {
    id: StateId,
    player: SharedPlayer,
    to_complete: Flag,
    transitions: Vec<StateTransition>,
}

impl RoleSelectState {
    pub fn new(player: SharedPlayer) -> Self {
        let to_complete = Flag::new();
        let transitions = vec![StateTransition::when(&to_complete, IDX_COMPLETE)];
        Self {
            id: ids::ROLE_SELECT,
            player,
            to_complete,
            transitions,
        }
    }
}

impl State<DeviceContext> for RoleSelectState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.to_complete.lower();
        ctx.buttons.claim(self.id);
        ctx.lights
            .start(AnimationConfig::looped(AnimationKind::Pulse));
        ctx.display.clear();
        ctx.display.draw_centered_text(12, "CHOOSE YOUR SIDE");
        ctx.display.draw_centered_text(34, "[P] HUNTER");
        ctx.display.draw_centered_text(46, "[S] BOUNTY");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if let Some(press) = ctx.buttons.take_press(self.id) {
            let role = match press.button {
                Button::Primary => Role::Hunter,
                Button::Secondary => Role::Bounty,
            };
            self.player.borrow_mut().role = role;
            info!(role = role.label(), "role chosen");
            self.to_complete.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id);
        ctx.lights.stop();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// Complete
// ─────────────────────────────────────────────────────────────────

/// Persist the profile, show the welcome card, hand off to quickdraw.
///
/// Terminal: the device pauses this app when the switch lands, the parked
/// machine completes, and any later visit starts from Welcome again.
pub struct CompleteState {
    id: StateId,
    player: SharedPlayer,
    progress: ProgressManager,
    dwell: Timer,
    sent: bool,
}

impl CompleteState {
    pub fn new(player: SharedPlayer, progress: ProgressManager) -> Self {
        Self {
            id: ids::COMPLETE,
            player,
            progress,
            dwell: Timer::new(),
            sent: false,
        }
    }
}

impl State<DeviceContext> for CompleteState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.sent = false;

        let player = self.player.borrow();
        if let Err(err) = self.progress.save_player(&ctx.storage, &player) {
            warn!(%err, "profile not saved, registration will repeat next boot");
        }
        info!(
            handle = %player.handle,
            role = player.role.label(),
            "player registered"
        );

        ctx.lights
            .start(AnimationConfig::new(AnimationKind::VerticalChase));
        ctx.display.clear();
        ctx.display.draw_centered_text(12, "WELCOME");
        ctx.display.draw_centered_text(30, player.handle.clone());
        ctx.display.draw_centered_text(48, player.role.label());
        ctx.display.render();
        drop(player);

        self.dwell.start(ctx.now_ms(), HANDOFF_DWELL_MS);
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if !self.sent && self.dwell.expired(ctx.now_ms()) {
            ctx.request_app_switch(QUICKDRAW_APP_ID);
            self.sent = true;
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.lights.stop();
        self.dwell.invalidate();
    }

    fn is_terminal(&self) -> bool {
        true
    }
}

/// Assemble the registration machine. Push order must match the index
/// constants above.
pub fn build_registration_app(
    player: SharedPlayer,
    progress: ProgressManager,
) -> StateMachine<DeviceContext> {
    let mut machine = StateMachine::new(REGISTRATION_APP_ID);
    machine.push_state(Box::new(WelcomeState::new(progress)));
    machine.push_state(Box::new(RoleSelectState::new(player.clone())));
    machine.push_state(Box::new(CompleteState::new(player, progress)));
    machine
}

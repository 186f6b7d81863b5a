//! The hidden code entry for players holding all seven buttons

use pdn_core::prelude::*;
use pdn_core::{Flag, State, StateId, StateTransition, Timer};
use pdn_device::drivers::{AnimationConfig, AnimationKind, Button};
use pdn_device::DeviceContext;

use crate::player::SharedPlayer;
use crate::progress::ProgressManager;

use super::{ids, IDX_CODE_ACCEPTED, IDX_CODE_REJECTED, IDX_GAME_OVER};

/// The sequence a full collection earns the right to attempt
pub const KONAMI_CODE: [Button; 7] = [
    Button::Primary,
    Button::Primary,
    Button::Secondary,
    Button::Secondary,
    Button::Primary,
    Button::Secondary,
    Button::Primary,
];

const CODE_STEP_MS: u64 = 3000;
const ACCEPT_DWELL_MS: u64 = 3000;
const REJECT_DWELL_MS: u64 = 2000;
const REJECT_STING_MS: u64 = 400;

/// Reads the code one press at a time. Each press restarts the step clock;
/// a wrong button or a stall ends the attempt.
pub struct CodeEntryState {
    position: usize,
    step: Timer,
    accepted: Flag,
    rejected: Flag,
    transitions: Vec<StateTransition>,
}

impl CodeEntryState {
    pub fn new() -> Self {
        let accepted = Flag::new();
        let rejected = Flag::new();
        let transitions = vec![
            StateTransition::when(&accepted, IDX_CODE_ACCEPTED),
            StateTransition::when(&rejected, IDX_CODE_REJECTED),
        ];
        Self {
            position: 0,
            step: Timer::new(),
            accepted,
            rejected,
            transitions,
        }
    }

    fn draw_progress(&self, ctx: &mut DeviceContext) {
        let dots: String = (0..KONAMI_CODE.len())
            .map(|i| if i < self.position { '#' } else { '.' })
            .collect();
        ctx.display.clear();
        ctx.display.draw_centered_text(12, "ENTER CODE");
        ctx.display.draw_centered_text(32, &dots);
        ctx.display.render();
    }
}

impl Default for CodeEntryState {
    fn default() -> Self {
        Self::new()
    }
}

impl State<DeviceContext> for CodeEntryState {
    fn id(&self) -> StateId {
        ids::CODE_ENTRY
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.accepted.lower();
        self.rejected.lower();
        self.position = 0;
        ctx.buttons.claim(self.id());
        self.step.start(ctx.now_ms(), CODE_STEP_MS);
        ctx.lights
            .start(AnimationConfig::looped(AnimationKind::Pulse).with_speed(0.5));
        self.draw_progress(ctx);
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        while let Some(press) = ctx.buttons.take_press(self.id()) {
            // only the button matters, not how long it was held
            if press.button == KONAMI_CODE[self.position] {
                self.position += 1;
                if self.position == KONAMI_CODE.len() {
                    info!("code accepted");
                    self.accepted.raise();
                    return;
                }
                self.step.start(ctx.now_ms(), CODE_STEP_MS);
                self.draw_progress(ctx);
            } else {
                debug!(position = self.position, "wrong button, attempt over");
                self.rejected.raise();
                return;
            }
        }
        if self.step.expired(ctx.now_ms()) {
            debug!(position = self.position, "code entry stalled out");
            self.rejected.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id());
        ctx.lights.stop();
        self.step.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// CodeAccepted
// ─────────────────────────────────────────────────────────────────

/// Flips the profile into recreational mode and celebrates
pub struct CodeAcceptedState {
    player: SharedPlayer,
    progress: ProgressManager,
    dwell: Timer,
    done: Flag,
    transitions: Vec<StateTransition>,
}

impl CodeAcceptedState {
    pub fn new(player: SharedPlayer, progress: ProgressManager) -> Self {
        let done = Flag::new();
        let transitions = vec![StateTransition::when(&done, IDX_GAME_OVER)];
        Self {
            player,
            progress,
            dwell: Timer::new(),
            done,
            transitions,
        }
    }
}

impl State<DeviceContext> for CodeAcceptedState {
    fn id(&self) -> StateId {
        ids::CODE_ACCEPTED
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.done.lower();
        self.player.borrow_mut().recreational = true;
        if let Err(err) = self
            .progress
            .save_player(&ctx.storage, &self.player.borrow())
        {
            warn!(%err, "recreational unlock not persisted");
        }
        info!("recreational mode unlocked");

        self.dwell.start(ctx.now_ms(), ACCEPT_DWELL_MS);
        ctx.lights
            .start(AnimationConfig::looped(AnimationKind::Strobe).with_speed(1.5));
        ctx.display.clear();
        ctx.display.draw_centered_text(16, "CODE ACCEPTED");
        ctx.display.draw_centered_text(36, "RECREATIONAL MODE");
        ctx.display.draw_centered_text(48, "UNLOCKED");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if self.dwell.expired(ctx.now_ms()) {
            self.done.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.lights.stop();
        self.dwell.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// CodeRejected
// ─────────────────────────────────────────────────────────────────

pub struct CodeRejectedState {
    dwell: Timer,
    sting: Timer,
    done: Flag,
    transitions: Vec<StateTransition>,
}

impl CodeRejectedState {
    pub fn new() -> Self {
        let done = Flag::new();
        let transitions = vec![StateTransition::when(&done, IDX_GAME_OVER)];
        Self {
            dwell: Timer::new(),
            sting: Timer::new(),
            done,
            transitions,
        }
    }
}

impl Default for CodeRejectedState {
    fn default() -> Self {
        Self::new()
    }
}

impl State<DeviceContext> for CodeRejectedState {
    fn id(&self) -> StateId {
        ids::CODE_REJECTED
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.done.lower();
        self.dwell.start(ctx.now_ms(), REJECT_DWELL_MS);
        self.sting.start(ctx.now_ms(), REJECT_STING_MS);
        ctx.haptics.set_intensity(255);
        ctx.display.clear();
        ctx.display.draw_centered_text(28, "ACCESS DENIED");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if self.sting.is_running() && self.sting.expired(ctx.now_ms()) {
            ctx.haptics.off();
            self.sting.invalidate();
        }
        if self.dwell.expired(ctx.now_ms()) {
            self.done.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.haptics.off();
        self.dwell.invalidate();
        self.sting.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;
    use pdn_core::SimClock;
    use pdn_device::drivers::ButtonInteraction;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::tempdir;

    fn harness() -> (DeviceContext, SimClock, tempfile::TempDir) {
        let clock = SimClock::new();
        let dir = tempdir().unwrap();
        let ctx = DeviceContext::new("test", dir.path(), Rc::new(clock.clone())).unwrap();
        (ctx, clock, dir)
    }

    fn press(ctx: &mut DeviceContext, button: Button) {
        ctx.buttons.inject(button, ButtonInteraction::Click);
    }

    #[test]
    fn test_full_sequence_is_accepted() {
        let (mut ctx, _clock, _dir) = harness();
        let mut state = CodeEntryState::new();
        state.on_mounted(&mut ctx);

        for button in KONAMI_CODE {
            press(&mut ctx, button);
            state.on_loop(&mut ctx);
        }

        assert!(state.transitions()[0].is_satisfied());
        assert_eq!(state.transitions()[0].target(), IDX_CODE_ACCEPTED);
        assert!(!state.transitions()[1].is_satisfied());
    }

    #[test]
    fn test_wrong_button_is_rejected() {
        let (mut ctx, _clock, _dir) = harness();
        let mut state = CodeEntryState::new();
        state.on_mounted(&mut ctx);

        press(&mut ctx, KONAMI_CODE[0]);
        press(&mut ctx, KONAMI_CODE[1]);
        // third entry wants Secondary
        press(&mut ctx, Button::Primary);
        state.on_loop(&mut ctx);

        assert!(state.transitions()[1].is_satisfied());
        assert_eq!(state.transitions()[1].target(), IDX_CODE_REJECTED);
    }

    #[test]
    fn test_stalled_entry_is_rejected() {
        let (mut ctx, clock, _dir) = harness();
        let mut state = CodeEntryState::new();
        state.on_mounted(&mut ctx);

        press(&mut ctx, KONAMI_CODE[0]);
        state.on_loop(&mut ctx);
        assert!(!state.transitions()[1].is_satisfied());

        clock.advance(CODE_STEP_MS);
        state.on_loop(&mut ctx);
        assert!(state.transitions()[1].is_satisfied());
    }

    #[test]
    fn test_accepting_flips_recreational_and_saves() {
        let (mut ctx, clock, _dir) = harness();
        let player = Rc::new(RefCell::new(Player::new("test", "tester")));
        let progress = ProgressManager::new(0);
        let mut state = CodeAcceptedState::new(player.clone(), progress);

        state.on_mounted(&mut ctx);
        assert!(player.borrow().recreational);
        assert!(progress.load_player(&ctx.storage).unwrap().recreational);

        clock.advance(ACCEPT_DWELL_MS);
        state.on_loop(&mut ctx);
        assert!(state.transitions()[0].is_satisfied());
    }
}

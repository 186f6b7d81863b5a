//! Reward ceremonies and the hand-back to the hunter app

use pdn_core::prelude::*;
use pdn_core::{Flag, State, StateId, StateTransition, Timer, QUICKDRAW_APP_ID};
use pdn_device::drivers::{AnimationConfig, AnimationKind};
use pdn_device::DeviceContext;

use crate::player::SharedPlayer;
use crate::progress::ProgressManager;

use super::{ids, IDX_GAME_OVER};

const REWARD_DWELL_MS: u64 = 3000;
const AWARD_BUZZ_MS: u64 = 200;
const RETURN_DWELL_MS: u64 = 1200;

/// Celebrates a first easy win and burns the game's button into the profile
pub struct ButtonAwardedState {
    player: SharedPlayer,
    progress: ProgressManager,
    dwell: Timer,
    buzz: Timer,
    done: Flag,
    transitions: Vec<StateTransition>,
}

impl ButtonAwardedState {
    pub fn new(player: SharedPlayer, progress: ProgressManager) -> Self {
        let done = Flag::new();
        let transitions = vec![StateTransition::when(&done, IDX_GAME_OVER)];
        Self {
            player,
            progress,
            dwell: Timer::new(),
            buzz: Timer::new(),
            done,
            transitions,
        }
    }
}

impl State<DeviceContext> for ButtonAwardedState {
    fn id(&self) -> StateId {
        ids::BUTTON_AWARDED
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.done.lower();

        let encounter = self.player.borrow().last_fdn;
        let Some(encounter) = encounter else {
            warn!("button award reached without an encounter on record");
            self.done.raise();
            return;
        };
        let Some(index) = encounter.game.bit_index() else {
            warn!(game = encounter.game.name(), "no button slot for this game");
            self.done.raise();
            return;
        };

        let unlocked = {
            let mut player = self.player.borrow_mut();
            player.unlock_button(index);
            player.buttons_mask().count_ones()
        };
        if let Err(err) = self
            .progress
            .save_player(&ctx.storage, &self.player.borrow())
        {
            warn!(%err, "button award not persisted");
        }
        info!(game = encounter.game.name(), unlocked, "button awarded");

        self.dwell.start(ctx.now_ms(), REWARD_DWELL_MS);
        self.buzz.start(ctx.now_ms(), AWARD_BUZZ_MS);
        ctx.haptics.set_intensity(150);
        ctx.lights
            .start(AnimationConfig::looped(AnimationKind::Pulse));

        ctx.display.clear();
        ctx.display.draw_centered_text(12, "BUTTON EARNED");
        ctx.display.draw_centered_text(30, encounter.game.name());
        ctx.display
            .draw_centered_text(48, &format!("{unlocked}/7"));
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if self.buzz.is_running() && self.buzz.expired(ctx.now_ms()) {
            ctx.haptics.off();
            self.buzz.invalidate();
        }
        if self.dwell.expired(ctx.now_ms()) {
            self.done.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.haptics.off();
        ctx.lights.stop();
        self.dwell.invalidate();
        self.buzz.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// BoonAwarded
// ─────────────────────────────────────────────────────────────────

/// Celebrates a hard-mode win and unlocks the game's light profile
pub struct BoonAwardedState {
    player: SharedPlayer,
    progress: ProgressManager,
    dwell: Timer,
    buzz: Timer,
    done: Flag,
    transitions: Vec<StateTransition>,
}

impl BoonAwardedState {
    pub fn new(player: SharedPlayer, progress: ProgressManager) -> Self {
        let done = Flag::new();
        let transitions = vec![StateTransition::when(&done, IDX_GAME_OVER)];
        Self {
            player,
            progress,
            dwell: Timer::new(),
            buzz: Timer::new(),
            done,
            transitions,
        }
    }
}

impl State<DeviceContext> for BoonAwardedState {
    fn id(&self) -> StateId {
        ids::BOON_AWARDED
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.done.lower();

        let encounter = self.player.borrow().last_fdn;
        let Some(encounter) = encounter else {
            warn!("boon award reached without an encounter on record");
            self.done.raise();
            return;
        };
        let Some(index) = encounter.game.bit_index() else {
            warn!(game = encounter.game.name(), "no boon slot for this game");
            self.done.raise();
            return;
        };

        self.player.borrow_mut().award_boon(index);
        if let Err(err) = self
            .progress
            .save_player(&ctx.storage, &self.player.borrow())
        {
            warn!(%err, "boon award not persisted");
        }
        info!(game = encounter.game.name(), "boon awarded");

        self.dwell.start(ctx.now_ms(), REWARD_DWELL_MS);
        self.buzz.start(ctx.now_ms(), AWARD_BUZZ_MS);
        ctx.haptics.set_intensity(180);
        ctx.lights
            .start(AnimationConfig::looped(AnimationKind::VerticalChase).with_speed(2.0));

        ctx.display.clear();
        ctx.display.draw_centered_text(12, "BOON EARNED");
        ctx.display.draw_centered_text(30, encounter.game.name());
        ctx.display.draw_centered_text(48, "NEW LIGHT PROFILE");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if self.buzz.is_running() && self.buzz.expired(ctx.now_ms()) {
            ctx.haptics.off();
            self.buzz.invalidate();
        }
        if self.dwell.expired(ctx.now_ms()) {
            self.done.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.haptics.off();
        ctx.lights.stop();
        self.dwell.invalidate();
        self.buzz.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// GameOverReturn
// ─────────────────────────────────────────────────────────────────

/// Closes the encounter and hands the device back to the hunter app.
///
/// Terminal: when the device pauses this app to make the switch, the parked
/// machine completes instead, so the next FDN starts from a fresh mount.
pub struct GameOverReturnState {
    dwell: Timer,
    sent: bool,
}

impl GameOverReturnState {
    pub fn new() -> Self {
        Self {
            dwell: Timer::new(),
            sent: false,
        }
    }
}

impl Default for GameOverReturnState {
    fn default() -> Self {
        Self::new()
    }
}

impl State<DeviceContext> for GameOverReturnState {
    fn id(&self) -> StateId {
        ids::GAME_OVER_RETURN
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.sent = false;
        self.dwell.start(ctx.now_ms(), RETURN_DWELL_MS);
        ctx.lights.clear();
        ctx.display.clear();
        ctx.display.draw_centered_text(24, "LINK CLOSED");
        ctx.display.draw_centered_text(40, "RETURNING...");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if !self.sent && self.dwell.expired(ctx.now_ms()) {
            ctx.request_app_switch(QUICKDRAW_APP_ID);
            self.sent = true;
        }
    }

    fn on_dismounted(&mut self, _ctx: &mut DeviceContext) {
        self.dwell.invalidate();
    }

    fn is_terminal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{FdnEncounter, FdnGameType, Player};
    use pdn_core::SimClock;
    use pdn_device::AppCommand;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::tempdir;

    fn harness() -> (DeviceContext, SimClock, tempfile::TempDir) {
        let clock = SimClock::new();
        let dir = tempdir().unwrap();
        let ctx = DeviceContext::new("test", dir.path(), Rc::new(clock.clone())).unwrap();
        (ctx, clock, dir)
    }

    fn player_with_encounter(game: FdnGameType) -> SharedPlayer {
        let mut player = Player::new("test", "tester");
        player.last_fdn = Some(FdnEncounter {
            game,
            peer_buttons: 0,
        });
        Rc::new(RefCell::new(player))
    }

    #[test]
    fn test_button_award_unlocks_and_persists() {
        let (mut ctx, clock, _dir) = harness();
        let player = player_with_encounter(FdnGameType::FirewallDecrypt);
        let progress = ProgressManager::new(0);
        let mut state = ButtonAwardedState::new(player.clone(), progress);

        state.on_mounted(&mut ctx);
        assert!(player.borrow().has_button(3));

        let stored = progress.load_player(&ctx.storage).unwrap();
        assert!(stored.has_button(3));

        clock.advance(REWARD_DWELL_MS);
        state.on_loop(&mut ctx);
        assert!(state.transitions()[0].is_satisfied());
        assert_eq!(state.transitions()[0].target(), IDX_GAME_OVER);
    }

    #[test]
    fn test_button_award_without_encounter_exits() {
        let (mut ctx, _clock, _dir) = harness();
        let player = Rc::new(RefCell::new(Player::new("test", "tester")));
        let mut state = ButtonAwardedState::new(player.clone(), ProgressManager::new(0));

        state.on_mounted(&mut ctx);
        assert!(state.transitions()[0].is_satisfied());
        assert_eq!(player.borrow().buttons_mask(), 0);
    }

    #[test]
    fn test_boon_award_unlocks_profile() {
        let (mut ctx, _clock, _dir) = harness();
        let player = player_with_encounter(FdnGameType::SignalEcho);
        let mut state = BoonAwardedState::new(player.clone(), ProgressManager::new(0));

        state.on_mounted(&mut ctx);
        assert!(player.borrow().has_boon(0));
        // boon slot 0 maps to profile 1; 0 is the stock profile
        assert_eq!(player.borrow().unlocked_profiles(), vec![0, 1]);
    }

    #[test]
    fn test_game_over_returns_to_hunter_app_once() {
        let (mut ctx, clock, _dir) = harness();
        let mut state = GameOverReturnState::new();

        state.on_mounted(&mut ctx);
        state.on_loop(&mut ctx);
        assert!(ctx.take_app_command().is_none());

        clock.advance(RETURN_DWELL_MS);
        state.on_loop(&mut ctx);
        assert_eq!(
            ctx.take_app_command(),
            Some(AppCommand::SwitchTo(QUICKDRAW_APP_ID))
        );

        state.on_loop(&mut ctx);
        assert!(ctx.take_app_command().is_none());
        assert!(state.is_terminal());
    }
}

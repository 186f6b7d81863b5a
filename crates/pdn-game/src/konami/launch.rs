//! Launch bridges into the minigame apps, and the mastery menu

use serde::{Deserialize, Serialize};

use pdn_core::prelude::*;
use pdn_core::{minigame_app_id, Flag, Snapshot, State, StateId, StateTransition, Timer};
use pdn_device::drivers::Button;
use pdn_device::{DeviceContext, GameResult, LaunchRequest, MiniGameOutcome};

use crate::player::{FdnGameType, SharedPlayer};
use crate::progress::ProgressManager;

use super::{
    ids, IDX_BOON_AWARDED, IDX_BUTTON_AWARDED, IDX_GAME_OVER, IDX_HARD_BASE, IDX_REPLAY_BASE,
};

const LAUNCH_DELAY_MS: u64 = 1500;
const MASTERY_MENU_TIMEOUT_MS: u64 = 10_000;

/// Which band this launch state sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    EasyFirst,
    EasyReplay,
    Hard,
}

impl LaunchMode {
    fn caption(&self) -> &'static str {
        match self {
            LaunchMode::EasyFirst => "FIRST RUN",
            LaunchMode::EasyReplay => "REPLAY",
            LaunchMode::Hard => "HARD MODE",
        }
    }
}

#[derive(Serialize, Deserialize)]
struct LaunchSnapshot {
    game_launched: bool,
    game_resumed: bool,
}

/// Hands the device to a minigame app and books the outcome it posts back.
///
/// The state mounts, dwells on a loading card, fires the app switch, and is
/// paused by the device. When the game finishes the device resumes it; the
/// next loop collects the outcome and raises the reward flag its band calls
/// for. A win on the easy replay doesn't award anything on the spot, it
/// unlocks the hard run for the next encounter.
pub struct GameLaunchState {
    id: StateId,
    mode: LaunchMode,
    game: FdnGameType,
    index: u8,
    player: SharedPlayer,
    progress: ProgressManager,
    launch_delay: Timer,
    launched: bool,
    resumed: bool,
    button_awarded: Flag,
    boon_awarded: Flag,
    game_over: Flag,
    transitions: Vec<StateTransition>,
}

impl GameLaunchState {
    pub fn new(
        mode: LaunchMode,
        game: FdnGameType,
        player: SharedPlayer,
        progress: ProgressManager,
    ) -> Self {
        debug_assert!(game.bit_index().is_some());
        let index = game.bit_index().unwrap_or(0);
        let id = match mode {
            LaunchMode::EasyFirst => ids::easy_launch(index),
            LaunchMode::EasyReplay => ids::easy_replay(index),
            LaunchMode::Hard => ids::hard_launch(index),
        };
        let button_awarded = Flag::new();
        let boon_awarded = Flag::new();
        let game_over = Flag::new();
        let transitions = match mode {
            LaunchMode::EasyFirst => vec![
                StateTransition::when(&button_awarded, IDX_BUTTON_AWARDED),
                StateTransition::when(&game_over, IDX_GAME_OVER),
            ],
            LaunchMode::EasyReplay => vec![StateTransition::when(&game_over, IDX_GAME_OVER)],
            LaunchMode::Hard => vec![
                StateTransition::when(&boon_awarded, IDX_BOON_AWARDED),
                StateTransition::when(&game_over, IDX_GAME_OVER),
            ],
        };
        Self {
            id,
            mode,
            game,
            index,
            player,
            progress,
            launch_delay: Timer::new(),
            launched: false,
            resumed: false,
            button_awarded,
            boon_awarded,
            game_over,
            transitions,
        }
    }

    fn handle_outcome(&mut self, ctx: &mut DeviceContext, outcome: MiniGameOutcome) {
        let won = outcome.result == GameResult::Won;
        info!(
            game = self.game.name(),
            mode = ?self.mode,
            won,
            score = outcome.score,
            "game finished"
        );
        match (self.mode, won) {
            (LaunchMode::EasyFirst, true) => self.button_awarded.raise(),
            (LaunchMode::Hard, true) => self.boon_awarded.raise(),
            (LaunchMode::EasyReplay, true) => {
                // winning the replay is what opens the hard run
                self.player.borrow_mut().unlock_hard(self.index);
                if let Err(err) = self
                    .progress
                    .save_player(&ctx.storage, &self.player.borrow())
                {
                    warn!(%err, "hard unlock not persisted");
                }
                info!(game = self.game.name(), "hard mode unlocked");
                self.game_over.raise();
            }
            (_, false) => self.game_over.raise(),
        }
    }
}

impl State<DeviceContext> for GameLaunchState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.button_awarded.lower();
        self.boon_awarded.lower();
        self.game_over.lower();
        self.launched = false;
        self.resumed = false;
        self.launch_delay.start(ctx.now_ms(), LAUNCH_DELAY_MS);

        ctx.display.clear();
        ctx.display.draw_centered_text(16, self.game.name());
        ctx.display.draw_centered_text(32, self.mode.caption());
        ctx.display.draw_centered_text(48, "LOADING...");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if self.resumed {
            match ctx.take_outcome() {
                Some(outcome) => self.handle_outcome(ctx, outcome),
                None => {
                    warn!("came back from a game with no outcome posted");
                    self.game_over.raise();
                }
            }
            self.resumed = false;
            return;
        }

        if !self.launched && self.launch_delay.expired(ctx.now_ms()) {
            ctx.set_launch_request(LaunchRequest {
                hard_mode: self.mode == LaunchMode::Hard,
                managed: true,
            });
            ctx.request_app_switch(minigame_app_id(self.index));
            self.launched = true;
        }
    }

    fn on_dismounted(&mut self, _ctx: &mut DeviceContext) {
        self.launch_delay.invalidate();
    }

    fn on_paused(&mut self, _ctx: &mut DeviceContext) -> Option<Snapshot> {
        Snapshot::capture(
            self.id,
            &LaunchSnapshot {
                game_launched: self.launched,
                game_resumed: self.resumed,
            },
        )
    }

    fn on_resumed(&mut self, _ctx: &mut DeviceContext, snapshot: Option<Snapshot>) {
        if let Some(snap) = snapshot.and_then(|s| s.restore::<LaunchSnapshot>(self.id)) {
            self.launched = snap.game_launched;
        }
        self.resumed = true;
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// MasteryMenu
// ─────────────────────────────────────────────────────────────────

/// Post-boon choice between replaying easy and rerunning hard
pub struct MasteryMenuState {
    id: StateId,
    game: FdnGameType,
    menu: Timer,
    to_easy: Flag,
    to_hard: Flag,
    to_game_over: Flag,
    transitions: Vec<StateTransition>,
}

impl MasteryMenuState {
    pub fn new(game: FdnGameType) -> Self {
        debug_assert!(game.bit_index().is_some());
        let index = usize::from(game.bit_index().unwrap_or(0));
        let to_easy = Flag::new();
        let to_hard = Flag::new();
        let to_game_over = Flag::new();
        let transitions = vec![
            StateTransition::when(&to_easy, IDX_REPLAY_BASE + index),
            StateTransition::when(&to_hard, IDX_HARD_BASE + index),
            StateTransition::when(&to_game_over, IDX_GAME_OVER),
        ];
        Self {
            id: ids::mastery_menu(game.bit_index().unwrap_or(0)),
            game,
            menu: Timer::new(),
            to_easy,
            to_hard,
            to_game_over,
            transitions,
        }
    }
}

impl State<DeviceContext> for MasteryMenuState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.to_easy.lower();
        self.to_hard.lower();
        self.to_game_over.lower();
        ctx.buttons.claim(self.id);
        self.menu.start(ctx.now_ms(), MASTERY_MENU_TIMEOUT_MS);

        ctx.display.clear();
        ctx.display.draw_centered_text(12, self.game.name());
        ctx.display.draw_centered_text(28, "MASTERED");
        ctx.display.draw_centered_text(48, "[P] EASY  [S] HARD");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        while let Some(press) = ctx.buttons.take_press(self.id) {
            match press.button {
                Button::Primary => self.to_easy.raise(),
                Button::Secondary => self.to_hard.raise(),
            }
        }
        if self.menu.expired(ctx.now_ms()) {
            self.to_game_over.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id);
        self.menu.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;
    use pdn_core::{SimClock, BREACH_DEFENSE_APP_ID};
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

    fn shared_player() -> SharedPlayer {
        Rc::new(RefCell::new(Player::new("test", "tester")))
    }

    fn won() -> MiniGameOutcome {
        MiniGameOutcome {
            result: GameResult::Won,
            score: 500,
            hard_mode: false,
        }
    }

    fn lost() -> MiniGameOutcome {
        MiniGameOutcome {
            result: GameResult::Lost,
            score: 100,
            hard_mode: false,
        }
    }

    fn round_trip(state: &mut GameLaunchState, ctx: &mut DeviceContext, outcome: MiniGameOutcome) {
        let snapshot = state.on_paused(ctx);
        ctx.post_outcome(outcome);
        state.on_resumed(ctx, snapshot);
        state.on_loop(ctx);
    }

    #[test]
    fn test_launch_fires_after_the_delay() {
        let (mut ctx, clock, _dir) = harness();
        let mut state = GameLaunchState::new(
            LaunchMode::EasyFirst,
            FdnGameType::BreachDefense,
            shared_player(),
            ProgressManager::new(0),
        );

        state.on_mounted(&mut ctx);
        state.on_loop(&mut ctx);
        assert!(ctx.take_app_command().is_none());

        clock.advance(LAUNCH_DELAY_MS);
        state.on_loop(&mut ctx);
        assert_eq!(
            ctx.take_app_command(),
            Some(AppCommand::SwitchTo(BREACH_DEFENSE_APP_ID))
        );
        let request = ctx.take_launch_request().unwrap();
        assert!(request.managed);
        assert!(!request.hard_mode);

        // already launched, must not fire twice
        clock.advance(LAUNCH_DELAY_MS);
        state.on_loop(&mut ctx);
        assert!(ctx.take_app_command().is_none());
    }

    #[test]
    fn test_hard_band_requests_hard_mode() {
        let (mut ctx, clock, _dir) = harness();
        let mut state = GameLaunchState::new(
            LaunchMode::Hard,
            FdnGameType::SignalEcho,
            shared_player(),
            ProgressManager::new(0),
        );

        state.on_mounted(&mut ctx);
        clock.advance(LAUNCH_DELAY_MS);
        state.on_loop(&mut ctx);
        assert!(ctx.take_launch_request().unwrap().hard_mode);
    }

    #[test]
    fn test_easy_first_win_raises_the_button_award() {
        let (mut ctx, clock, _dir) = harness();
        let mut state = GameLaunchState::new(
            LaunchMode::EasyFirst,
            FdnGameType::GhostRunner,
            shared_player(),
            ProgressManager::new(0),
        );

        state.on_mounted(&mut ctx);
        clock.advance(LAUNCH_DELAY_MS);
        state.on_loop(&mut ctx);
        ctx.take_app_command();

        round_trip(&mut state, &mut ctx, won());
        assert!(state.transitions()[0].is_satisfied());
        assert_eq!(state.transitions()[0].target(), IDX_BUTTON_AWARDED);
    }

    #[test]
    fn test_easy_replay_win_unlocks_hard_without_award() {
        let (mut ctx, clock, _dir) = harness();
        let player = shared_player();
        let mut state = GameLaunchState::new(
            LaunchMode::EasyReplay,
            FdnGameType::GhostRunner,
            player.clone(),
            ProgressManager::new(0),
        );

        state.on_mounted(&mut ctx);
        clock.advance(LAUNCH_DELAY_MS);
        state.on_loop(&mut ctx);
        ctx.take_app_command();

        round_trip(&mut state, &mut ctx, won());
        assert!(player.borrow().hard_unlocked(1));
        // the only exit is game over; no reward state is wired
        assert_eq!(state.transitions().len(), 1);
        assert!(state.transitions()[0].is_satisfied());
        assert_eq!(state.transitions()[0].target(), IDX_GAME_OVER);
    }

    #[test]
    fn test_losses_go_to_game_over_in_every_band() {
        for mode in [LaunchMode::EasyFirst, LaunchMode::EasyReplay, LaunchMode::Hard] {
            let (mut ctx, clock, _dir) = harness();
            let player = shared_player();
            let mut state = GameLaunchState::new(
                mode,
                FdnGameType::CipherPath,
                player.clone(),
                ProgressManager::new(0),
            );

            state.on_mounted(&mut ctx);
            clock.advance(LAUNCH_DELAY_MS);
            state.on_loop(&mut ctx);
            ctx.take_app_command();

            round_trip(&mut state, &mut ctx, lost());
            let game_over = state
                .transitions()
                .iter()
                .find(|t| t.target() == IDX_GAME_OVER)
                .unwrap();
            assert!(game_over.is_satisfied());
            assert!(!player.borrow().hard_unlocked(4));
        }
    }

    #[test]
    fn test_resume_without_outcome_still_exits() {
        let (mut ctx, _clock, _dir) = harness();
        let mut state = GameLaunchState::new(
            LaunchMode::EasyFirst,
            FdnGameType::SpikeVector,
            shared_player(),
            ProgressManager::new(0),
        );

        state.on_mounted(&mut ctx);
        let snapshot = state.on_paused(&mut ctx);
        state.on_resumed(&mut ctx, snapshot);
        state.on_loop(&mut ctx);

        let game_over = state
            .transitions()
            .iter()
            .find(|t| t.target() == IDX_GAME_OVER)
            .unwrap();
        assert!(game_over.is_satisfied());
    }
}

//! Outcome settlement, the result screens, and history upload

use pdn_core::prelude::*;
use pdn_core::{Flag, State, StateId, StateTransition, Timer};
use pdn_device::drivers::{AnimationConfig, AnimationKind};
use pdn_device::DeviceContext;

use crate::config::Settings;
use crate::duel::{MatchOutcome, SharedMatches};
use crate::player::{Role, SharedPlayer};
use crate::progress::ProgressManager;

use super::{ids, IDX_IDLE, IDX_LOSE, IDX_UPLOAD_MATCHES, IDX_WIN};

const LOSE_STING_MS: u64 = 600;
const UPLOAD_DWELL_MS: u64 = 800;

// ─────────────────────────────────────────────────────────────────
// DuelResult
// ─────────────────────────────────────────────────────────────────

/// One-beat settlement: resolve the match, book the result, branch
pub struct DuelResultState {
    id: StateId,
    player: SharedPlayer,
    matches: SharedMatches,
    outcome: Option<MatchOutcome>,
    win: Flag,
    lose: Flag,
    to_idle: Flag,
    transitions: Vec<StateTransition>,
}

impl DuelResultState {
    pub fn new(player: SharedPlayer, matches: SharedMatches) -> Self {
        let win = Flag::new();
        let lose = Flag::new();
        let to_idle = Flag::new();
        let transitions = vec![
            StateTransition::when(&win, IDX_WIN),
            StateTransition::when(&lose, IDX_LOSE),
            StateTransition::when(&to_idle, IDX_IDLE),
        ];
        Self {
            id: ids::DUEL_RESULT,
            player,
            matches,
            outcome: None,
            win,
            lose,
            to_idle,
            transitions,
        }
    }
}

impl State<DeviceContext> for DuelResultState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, _ctx: &mut DeviceContext) {
        self.win.lower();
        self.lose.lower();
        self.to_idle.lower();

        self.outcome = self.matches.borrow_mut().resolve();
        match self.outcome {
            Some(MatchOutcome::Won) => self.player.borrow_mut().record_win(),
            Some(MatchOutcome::Lost) => self.player.borrow_mut().record_loss(),
            None => warn!("result state reached with no match to settle"),
        }
        self.matches.borrow_mut().complete();
    }

    fn on_loop(&mut self, _ctx: &mut DeviceContext) {
        match self.outcome {
            Some(MatchOutcome::Won) => self.win.raise(),
            Some(MatchOutcome::Lost) => self.lose.raise(),
            None => self.to_idle.raise(),
        }
    }

    fn on_dismounted(&mut self, _ctx: &mut DeviceContext) {}

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// Win
// ─────────────────────────────────────────────────────────────────

pub struct WinState {
    id: StateId,
    player: SharedPlayer,
    matches: SharedMatches,
    display_ms: u64,
    dwell: Timer,
    done: Flag,
    transitions: Vec<StateTransition>,
}

impl WinState {
    pub fn new(settings: &Settings, player: SharedPlayer, matches: SharedMatches) -> Self {
        let done = Flag::new();
        let transitions = vec![StateTransition::when(&done, IDX_UPLOAD_MATCHES)];
        Self {
            id: ids::WIN,
            player,
            matches,
            display_ms: settings.duel.result_display_ms,
            dwell: Timer::new(),
            done,
            transitions,
        }
    }
}

impl State<DeviceContext> for WinState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.done.lower();
        ctx.haptics.off();
        self.dwell.start(ctx.now_ms(), self.display_ms);

        let (role, streak) = {
            let player = self.player.borrow();
            (player.role, player.streak)
        };
        let animation = match role {
            Role::Hunter => AnimationKind::HunterWin,
            Role::Bounty => AnimationKind::BountyWin,
        };
        ctx.lights.start(AnimationConfig::looped(animation));

        let headline = match role {
            Role::Hunter => "TARGET DOWN",
            Role::Bounty => "HUNTER DOWN",
        };
        let reaction = self
            .matches
            .borrow()
            .last_completed()
            .and_then(|record| record.my_reaction_ms);
        ctx.display.clear();
        ctx.display.draw_centered_text(16, headline);
        if let Some(reaction) = reaction {
            ctx.display
                .draw_centered_text(32, format!("{} MS", reaction));
        }
        ctx.display
            .draw_centered_text(48, format!("STREAK {}", streak));
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if self.dwell.expired(ctx.now_ms()) {
            self.done.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.lights.stop();
        ctx.haptics.off();
        self.dwell.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// Lose
// ─────────────────────────────────────────────────────────────────

pub struct LoseState {
    id: StateId,
    display_ms: u64,
    dwell: Timer,
    sting: Timer,
    done: Flag,
    transitions: Vec<StateTransition>,
}

impl LoseState {
    pub fn new(settings: &Settings) -> Self {
        let done = Flag::new();
        let transitions = vec![StateTransition::when(&done, IDX_UPLOAD_MATCHES)];
        Self {
            id: ids::LOSE,
            display_ms: settings.duel.result_display_ms,
            dwell: Timer::new(),
            sting: Timer::new(),
            done,
            transitions,
        }
    }
}

impl State<DeviceContext> for LoseState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.done.lower();
        let now = ctx.now_ms();
        self.dwell.start(now, self.display_ms);
        self.sting.start(now, LOSE_STING_MS);
        ctx.haptics.set_intensity(255);
        ctx.lights.stop();
        ctx.display.clear();
        ctx.display.draw_centered_text(28, "YOU GOT BURNED");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        let now = ctx.now_ms();
        if self.sting.expired(now) {
            ctx.haptics.off();
            self.sting.invalidate();
        }
        if self.dwell.expired(now) {
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

// ─────────────────────────────────────────────────────────────────
// UploadMatches
// ─────────────────────────────────────────────────────────────────

/// Flush settled matches and the updated profile to storage
pub struct UploadMatchesState {
    id: StateId,
    player: SharedPlayer,
    matches: SharedMatches,
    progress: ProgressManager,
    dwell: Timer,
    done: Flag,
    transitions: Vec<StateTransition>,
}

impl UploadMatchesState {
    pub fn new(player: SharedPlayer, matches: SharedMatches, progress: ProgressManager) -> Self {
        let done = Flag::new();
        let transitions = vec![StateTransition::when(&done, IDX_IDLE)];
        Self {
            id: ids::UPLOAD_MATCHES,
            player,
            matches,
            progress,
            dwell: Timer::new(),
            done,
            transitions,
        }
    }
}

impl State<DeviceContext> for UploadMatchesState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.done.lower();

        let records = self.matches.borrow_mut().drain_completed();
        if let Err(err) = self.progress.append_matches(&ctx.storage, records) {
            warn!(%err, "match history not persisted");
        }
        if let Err(err) = self
            .progress
            .save_player(&ctx.storage, &self.player.borrow())
        {
            warn!(%err, "player profile not persisted");
        }

        self.dwell.start(ctx.now_ms(), UPLOAD_DWELL_MS);
        ctx.display.clear();
        ctx.display.draw_centered_text(28, "SYNCING...");
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if self.dwell.expired(ctx.now_ms()) {
            self.done.raise();
        }
    }

    fn on_dismounted(&mut self, _ctx: &mut DeviceContext) {
        self.dwell.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

//! The seven FDN minigame apps.
//!
//! Every game is assembled from the same composition pieces instead of a
//! base-class hierarchy: a [`GameMeta`] cell shared across the app's states,
//! an [`IntroState`] that applies the pending launch request and resets the
//! session, the game's own gameplay states, and an [`EndState`] per outcome
//! that posts the result and either returns to the launcher (managed mode)
//! or loops back to the intro (standalone play).
//!
//! Gameplay content is intentionally small; the contract with the launcher
//! (config in via launch request, outcome out via the mailbox, managed-mode
//! return) is the load-bearing part.

use std::cell::RefCell;
use std::rc::Rc;

use pdn_core::prelude::*;
use pdn_core::{Flag, State, StateId, StateTransition, Timer};
use pdn_device::drivers::{AnimationConfig, AnimationKind};
use pdn_device::{DeviceContext, GameResult, MiniGameOutcome};

mod breach_defense;
mod cipher_path;
mod exploit_sequencer;
mod firewall_decrypt;
mod ghost_runner;
mod signal_echo;
mod spike_vector;

pub use breach_defense::build_breach_defense_app;
pub use cipher_path::build_cipher_path_app;
pub use exploit_sequencer::build_exploit_sequencer_app;
pub use firewall_decrypt::build_firewall_decrypt_app;
pub use ghost_runner::build_ghost_runner_app;
pub use signal_echo::build_signal_echo_app;
pub use spike_vector::build_spike_vector_app;

const INTRO_DWELL_MS: u64 = 2000;
const END_DWELL_MS: u64 = 3000;
const END_BUZZ_MS: u64 = 250;

/// Session facts shared by every state in one game app
#[derive(Debug, Default)]
pub(crate) struct GameMeta {
    pub managed: bool,
    pub hard: bool,
    pub score: u32,
}

pub(crate) type SharedMeta = Rc<RefCell<GameMeta>>;

pub(crate) fn shared_meta() -> SharedMeta {
    Rc::new(RefCell::new(GameMeta::default()))
}

// ─────────────────────────────────────────────────────────────────
// Intro
// ─────────────────────────────────────────────────────────────────

/// Title card. Applies the launch request to the session, resets the score
/// and any per-game board through the reset hook, then rolls into gameplay.
pub(crate) struct IntroState {
    id: StateId,
    title: &'static str,
    subtitle: &'static str,
    meta: SharedMeta,
    reset: Option<Box<dyn FnMut(bool)>>,
    dwell: Timer,
    to_play: Flag,
    transitions: Vec<StateTransition>,
}

impl IntroState {
    pub fn new(id: StateId, title: &'static str, subtitle: &'static str, meta: SharedMeta) -> Self {
        let to_play = Flag::new();
        // gameplay sits at index 1 in every game machine
        let transitions = vec![StateTransition::when(&to_play, 1)];
        Self {
            id,
            title,
            subtitle,
            meta,
            reset: None,
            dwell: Timer::new(),
            to_play,
            transitions,
        }
    }

    /// Hook for games that keep board state outside their gameplay state
    pub fn with_reset(mut self, reset: impl FnMut(bool) + 'static) -> Self {
        self.reset = Some(Box::new(reset));
        self
    }
}

impl State<DeviceContext> for IntroState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.to_play.lower();
        let hard = {
            let mut meta = self.meta.borrow_mut();
            if let Some(request) = ctx.take_launch_request() {
                meta.managed = request.managed;
                meta.hard = request.hard_mode;
            }
            meta.score = 0;
            meta.hard
        };
        if let Some(reset) = self.reset.as_mut() {
            reset(hard);
        }
        debug!(game = self.title, hard, "session reset");

        self.dwell.start(ctx.now_ms(), INTRO_DWELL_MS);
        ctx.lights
            .start(AnimationConfig::looped(AnimationKind::Idle));

        ctx.display.clear();
        ctx.display.draw_centered_text(14, self.title);
        ctx.display.draw_centered_text(30, self.subtitle);
        let mode = if hard { "HARD" } else { "GET READY" };
        ctx.display.draw_centered_text(48, mode);
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if self.dwell.expired(ctx.now_ms()) {
            self.to_play.raise();
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
// End
// ─────────────────────────────────────────────────────────────────

pub(crate) struct EndConfig {
    pub id: StateId,
    pub headline: &'static str,
    pub detail: &'static str,
    pub won: bool,
    pub animation: Option<AnimationKind>,
    pub haptic_level: u8,
}

impl EndConfig {
    pub fn win(id: StateId, headline: &'static str) -> Self {
        Self {
            id,
            headline,
            detail: "",
            won: true,
            animation: Some(AnimationKind::VerticalChase),
            haptic_level: 120,
        }
    }

    pub fn lose(id: StateId, headline: &'static str) -> Self {
        Self {
            id,
            headline,
            detail: "",
            won: false,
            animation: None,
            haptic_level: 255,
        }
    }

    pub fn with_detail(mut self, detail: &'static str) -> Self {
        self.detail = detail;
        self
    }
}

/// Terminal card for one outcome. Posts the result the moment it mounts so
/// the launcher finds it waiting whenever the switch lands, shows the screen
/// for a beat, then hands control back or loops to the intro.
pub(crate) struct EndState {
    config: EndConfig,
    meta: SharedMeta,
    dwell: Timer,
    buzz: Timer,
    requested: bool,
    to_intro: Flag,
    transitions: Vec<StateTransition>,
}

impl EndState {
    pub fn new(meta: SharedMeta, config: EndConfig) -> Self {
        let to_intro = Flag::new();
        let transitions = vec![StateTransition::when(&to_intro, 0)];
        Self {
            config,
            meta,
            dwell: Timer::new(),
            buzz: Timer::new(),
            requested: false,
            to_intro,
            transitions,
        }
    }
}

impl State<DeviceContext> for EndState {
    fn id(&self) -> StateId {
        self.config.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.to_intro.lower();
        self.requested = false;

        let (score, hard) = {
            let meta = self.meta.borrow();
            (meta.score, meta.hard)
        };
        ctx.post_outcome(MiniGameOutcome {
            result: if self.config.won {
                GameResult::Won
            } else {
                GameResult::Lost
            },
            score,
            hard_mode: hard,
        });
        info!(won = self.config.won, score, "game over");

        self.dwell.start(ctx.now_ms(), END_DWELL_MS);
        if self.config.haptic_level > 0 {
            ctx.haptics.set_intensity(self.config.haptic_level);
            self.buzz.start(ctx.now_ms(), END_BUZZ_MS);
        }
        match self.config.animation {
            Some(kind) => ctx.lights.start(AnimationConfig::looped(kind)),
            None => ctx.lights.stop(),
        }

        ctx.display.clear();
        ctx.display.draw_centered_text(16, self.config.headline);
        if !self.config.detail.is_empty() {
            ctx.display.draw_centered_text(32, self.config.detail);
        }
        if self.config.won {
            ctx.display
                .draw_centered_text(48, &format!("SCORE {score}"));
        }
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if self.buzz.is_running() && self.buzz.expired(ctx.now_ms()) {
            ctx.haptics.off();
            self.buzz.invalidate();
        }
        if self.dwell.expired(ctx.now_ms()) {
            if self.meta.borrow().managed {
                if !self.requested {
                    ctx.request_return();
                    self.requested = true;
                }
            } else {
                self.to_intro.raise();
            }
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.haptics.off();
        ctx.lights.stop();
        self.dwell.invalidate();
        self.buzz.invalidate();
    }

    /// Managed runs end here. The pause that carries the device back to the
    /// launcher completes the machine, so the next launch mounts fresh.
    fn is_terminal(&self) -> bool {
        self.meta.borrow().managed
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

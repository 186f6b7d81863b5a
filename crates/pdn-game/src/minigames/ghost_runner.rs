//! Ghost Runner. The runner strides a looping track toward a gap; one
//! well-timed jump per lap clears it.

use pdn_core::{Flag, State, StateId, StateMachine, StateTransition, Timer, GHOST_RUNNER_APP_ID};
use pdn_device::drivers::Button;
use pdn_device::DeviceContext;

use crate::difficulty::Difficulty;

use super::{shared_meta, EndConfig, EndState, IntroState, SharedMeta};

const INTRO_ID: StateId = StateId(400);
const GAMEPLAY_ID: StateId = StateId(401);
const WIN_ID: StateId = StateId(402);
const LOSE_ID: StateId = StateId(403);

const IDX_WIN: usize = 2;
const IDX_LOSE: usize = 3;

const TRACK_CELLS: usize = 24;
const GAP_END: usize = 20;

struct RunnerConfig {
    stride_ms: u64,
    gap_start: usize,
    rounds: u32,
    misses_allowed: u32,
}

impl RunnerConfig {
    fn for_mode(hard: bool) -> Self {
        let d = Difficulty::from_hard_flag(hard);
        Self {
            stride_ms: d.lerp_ms(120, 70),
            gap_start: d.lerp_usize(16, 18),
            rounds: d.lerp_u32(3, 5),
            misses_allowed: d.lerp_u32(1, 0),
        }
    }
}

struct GameplayState {
    meta: SharedMeta,
    config: RunnerConfig,
    cell: usize,
    round: u32,
    misses: u32,
    stride: Timer,
    won: Flag,
    lost: Flag,
    transitions: Vec<StateTransition>,
}

impl GameplayState {
    fn new(meta: SharedMeta) -> Self {
        let won = Flag::new();
        let lost = Flag::new();
        let transitions = vec![
            StateTransition::when(&lost, IDX_LOSE),
            StateTransition::when(&won, IDX_WIN),
        ];
        Self {
            meta,
            config: RunnerConfig::for_mode(false),
            cell: 0,
            round: 0,
            misses: 0,
            stride: Timer::new(),
            won,
            lost,
            transitions,
        }
    }

    fn over_gap(&self) -> bool {
        self.cell >= self.config.gap_start && self.cell < GAP_END
    }

    fn miss(&mut self, ctx: &mut DeviceContext) {
        self.misses += 1;
        ctx.haptics.set_intensity(220);
        if self.misses > self.config.misses_allowed {
            self.lost.raise();
        } else {
            self.cell = 0;
        }
    }

    fn render(&self, ctx: &mut DeviceContext) {
        let track: String = (0..TRACK_CELLS)
            .map(|i| {
                if i == self.cell {
                    '>'
                } else if i >= self.config.gap_start && i < GAP_END {
                    '_'
                } else {
                    '.'
                }
            })
            .collect();
        ctx.display.clear();
        ctx.display.draw_text(
            0,
            8,
            format!("JUMP {}/{}", self.round, self.config.rounds),
        );
        ctx.display.draw_centered_text(32, &track);
        ctx.display.draw_centered_text(52, "[P] JUMP");
        ctx.display.render();
    }
}

impl State<DeviceContext> for GameplayState {
    fn id(&self) -> StateId {
        GAMEPLAY_ID
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.won.lower();
        self.lost.lower();
        self.config = RunnerConfig::for_mode(self.meta.borrow().hard);
        self.cell = 0;
        self.round = 0;
        self.misses = 0;
        ctx.buttons.claim(self.id());
        self.stride.start(ctx.now_ms(), self.config.stride_ms);
        self.render(ctx);
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        while let Some(press) = ctx.buttons.take_press(self.id()) {
            if press.button != Button::Primary {
                continue;
            }
            if self.over_gap() {
                self.meta.borrow_mut().score += 100;
                self.round += 1;
                ctx.haptics.off();
                if self.round >= self.config.rounds {
                    self.won.raise();
                    return;
                }
                self.cell = 0;
            } else {
                // jumped at nothing
                self.miss(ctx);
                if self.lost.is_raised() {
                    return;
                }
            }
        }

        if self.stride.expired(ctx.now_ms()) {
            self.cell += 1;
            if self.cell >= TRACK_CELLS {
                // ran straight into the gap
                self.miss(ctx);
                if self.lost.is_raised() {
                    return;
                }
            }
            self.stride.start(ctx.now_ms(), self.config.stride_ms);
        }

        self.render(ctx);
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id());
        ctx.haptics.off();
        self.stride.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

pub fn build_ghost_runner_app() -> StateMachine<DeviceContext> {
    let meta = shared_meta();
    let mut machine = StateMachine::new(GHOST_RUNNER_APP_ID);
    machine.push_state(Box::new(IntroState::new(
        INTRO_ID,
        "GHOST RUNNER",
        "CLEAR THE GAPS",
        meta.clone(),
    )));
    machine.push_state(Box::new(GameplayState::new(meta.clone())));
    machine.push_state(Box::new(EndState::new(
        meta.clone(),
        EndConfig::win(WIN_ID, "CLEAN RUN"),
    )));
    machine.push_state(Box::new(EndState::new(
        meta,
        EndConfig::lose(LOSE_ID, "GHOSTED"),
    )));
    machine
}

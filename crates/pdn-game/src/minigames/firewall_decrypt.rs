//! Firewall Decrypt. A scanner sweeps the cipher bar; stop it inside the
//! unlock window. The window shrinks every round.

use rand::Rng;

use pdn_core::prelude::*;
use pdn_core::{Flag, State, StateId, StateMachine, StateTransition, Timer, FIREWALL_DECRYPT_APP_ID};
use pdn_device::DeviceContext;

use crate::difficulty::Difficulty;

use super::{shared_meta, EndConfig, EndState, IntroState, SharedMeta};

const INTRO_ID: StateId = StateId(600);
const GAMEPLAY_ID: StateId = StateId(601);
const WIN_ID: StateId = StateId(602);
const LOSE_ID: StateId = StateId(603);

const IDX_WIN: usize = 2;
const IDX_LOSE: usize = 3;

const BAR_CELLS: usize = 32;
const MIN_WINDOW: usize = 2;

struct DecryptConfig {
    sweep_ms: u64,
    start_window: usize,
    rounds: u32,
    strikes_allowed: u32,
    round_deadline_ms: u64,
}

impl DecryptConfig {
    fn for_mode(hard: bool) -> Self {
        let d = Difficulty::from_hard_flag(hard);
        Self {
            sweep_ms: d.lerp_ms(50, 30),
            start_window: d.lerp_usize(7, 5),
            rounds: d.lerp_u32(3, 5),
            strikes_allowed: d.lerp_u32(1, 0),
            round_deadline_ms: d.lerp_ms(8000, 4000),
        }
    }
}

struct GameplayState {
    meta: SharedMeta,
    config: DecryptConfig,
    round: u32,
    strikes: u32,
    cursor: usize,
    direction: i32,
    window_start: usize,
    window_width: usize,
    sweep: Timer,
    deadline: Timer,
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
            config: DecryptConfig::for_mode(false),
            round: 1,
            strikes: 0,
            cursor: 0,
            direction: 1,
            window_start: 0,
            window_width: 0,
            sweep: Timer::new(),
            deadline: Timer::new(),
            won,
            lost,
            transitions,
        }
    }

    fn deal_round(&mut self, ctx: &mut DeviceContext) {
        self.window_width = self
            .config
            .start_window
            .saturating_sub(self.round as usize - 1)
            .max(MIN_WINDOW);
        self.window_start = ctx.rng().gen_range(0..=BAR_CELLS - self.window_width);
        self.cursor = 0;
        self.direction = 1;
        self.sweep.start(ctx.now_ms(), self.config.sweep_ms);
        self.deadline.start(ctx.now_ms(), self.config.round_deadline_ms);
    }

    fn in_window(&self) -> bool {
        self.cursor >= self.window_start && self.cursor < self.window_start + self.window_width
    }

    fn strike(&mut self, ctx: &mut DeviceContext) {
        self.strikes += 1;
        ctx.haptics.set_intensity(200);
        if self.strikes > self.config.strikes_allowed {
            self.lost.raise();
        } else {
            self.deal_round(ctx);
        }
    }

    fn render(&self, ctx: &mut DeviceContext) {
        let bar: String = (0..BAR_CELLS)
            .map(|i| {
                if i == self.cursor {
                    '|'
                } else if i >= self.window_start && i < self.window_start + self.window_width {
                    '='
                } else {
                    '.'
                }
            })
            .collect();
        ctx.display.clear();
        ctx.display.draw_text(
            0,
            8,
            format!(
                "CRACK {}/{}  X{}",
                self.round, self.config.rounds, self.strikes
            ),
        );
        ctx.display.draw_centered_text(32, &bar);
        ctx.display.draw_centered_text(52, "STOP THE SWEEP");
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
        self.config = DecryptConfig::for_mode(self.meta.borrow().hard);
        self.round = 1;
        self.strikes = 0;
        ctx.buttons.claim(self.id());
        self.deal_round(ctx);
        self.render(ctx);
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        while let Some(_press) = ctx.buttons.take_press(self.id()) {
            if self.in_window() {
                self.meta.borrow_mut().score += 100;
                ctx.haptics.off();
                self.round += 1;
                if self.round > self.config.rounds {
                    self.won.raise();
                    return;
                }
                self.deal_round(ctx);
            } else {
                self.strike(ctx);
                if self.lost.is_raised() {
                    return;
                }
            }
        }

        if self.sweep.expired(ctx.now_ms()) {
            let next = self.cursor as i32 + self.direction;
            if next < 0 {
                self.direction = 1;
                self.cursor = 1;
            } else if next >= BAR_CELLS as i32 {
                self.direction = -1;
                self.cursor = BAR_CELLS - 2;
            } else {
                self.cursor = next as usize;
            }
            self.sweep.start(ctx.now_ms(), self.config.sweep_ms);
        }

        if self.deadline.expired(ctx.now_ms()) {
            debug!(round = self.round, "sweep ran out the clock");
            self.strike(ctx);
            if self.lost.is_raised() {
                return;
            }
        }

        self.render(ctx);
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id());
        ctx.haptics.off();
        self.sweep.invalidate();
        self.deadline.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

pub fn build_firewall_decrypt_app() -> StateMachine<DeviceContext> {
    let meta = shared_meta();
    let mut machine = StateMachine::new(FIREWALL_DECRYPT_APP_ID);
    machine.push_state(Box::new(IntroState::new(
        INTRO_ID,
        "FIREWALL DECRYPT",
        "STOP THE SWEEP",
        meta.clone(),
    )));
    machine.push_state(Box::new(GameplayState::new(meta.clone())));
    machine.push_state(Box::new(EndState::new(
        meta.clone(),
        EndConfig::win(WIN_ID, "FIREWALL DOWN"),
    )));
    machine.push_state(Box::new(EndState::new(
        meta,
        EndConfig::lose(LOSE_ID, "LOCKED OUT"),
    )));
    machine
}

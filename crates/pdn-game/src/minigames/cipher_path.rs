//! Cipher Path. A hidden route through fork after fork; wrong turns are
//! dead ends that burn moves from a fixed budget.

use rand::Rng;

use pdn_core::prelude::*;
use pdn_core::{Flag, State, StateId, StateMachine, StateTransition, Timer, CIPHER_PATH_APP_ID};
use pdn_device::drivers::Button;
use pdn_device::DeviceContext;

use crate::difficulty::Difficulty;

use super::{shared_meta, EndConfig, EndState, IntroState, SharedMeta};

const INTRO_ID: StateId = StateId(700);
const GAMEPLAY_ID: StateId = StateId(701);
const WIN_ID: StateId = StateId(702);
const LOSE_ID: StateId = StateId(703);

const IDX_WIN: usize = 2;
const IDX_LOSE: usize = 3;

const DEAD_END_FLASH_MS: u64 = 400;

struct PathConfig {
    path_len: usize,
    move_budget: u32,
}

impl PathConfig {
    fn for_mode(hard: bool) -> Self {
        let d = Difficulty::from_hard_flag(hard);
        Self {
            path_len: d.lerp_usize(6, 10),
            move_budget: d.lerp_u32(8, 10),
        }
    }
}

struct GameplayState {
    meta: SharedMeta,
    config: PathConfig,
    path: Vec<Button>,
    position: usize,
    moves_used: u32,
    flash: Timer,
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
            config: PathConfig::for_mode(false),
            path: Vec::new(),
            position: 0,
            moves_used: 0,
            flash: Timer::new(),
            won,
            lost,
            transitions,
        }
    }

    fn render(&self, ctx: &mut DeviceContext, dead_end: bool) {
        let trail: String = (0..self.config.path_len)
            .map(|i| if i < self.position { '#' } else { '.' })
            .collect();
        ctx.display.clear();
        ctx.display.draw_text(
            0,
            8,
            format!(
                "MOVES {}/{}",
                self.moves_used, self.config.move_budget
            ),
        );
        ctx.display.draw_centered_text(26, &trail);
        if dead_end {
            ctx.display.draw_centered_text(42, "DEAD END");
        }
        ctx.display.draw_centered_text(56, "[P] LEFT  [S] RIGHT");
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
        self.config = PathConfig::for_mode(self.meta.borrow().hard);
        self.position = 0;
        self.moves_used = 0;
        self.path = (0..self.config.path_len)
            .map(|_| {
                if ctx.rng().gen_bool(0.5) {
                    Button::Primary
                } else {
                    Button::Secondary
                }
            })
            .collect();
        ctx.buttons.claim(self.id());
        self.render(ctx, false);
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if self.flash.is_running() && self.flash.expired(ctx.now_ms()) {
            ctx.haptics.off();
            self.flash.invalidate();
            self.render(ctx, false);
        }

        while let Some(press) = ctx.buttons.take_press(self.id()) {
            self.moves_used += 1;
            if press.button == self.path[self.position] {
                self.position += 1;
                self.meta.borrow_mut().score += 25;
                if self.position >= self.config.path_len {
                    self.won.raise();
                    return;
                }
                self.render(ctx, false);
            } else {
                ctx.haptics.set_intensity(180);
                self.flash.start(ctx.now_ms(), DEAD_END_FLASH_MS);
                self.render(ctx, true);
            }
            if self.moves_used >= self.config.move_budget {
                debug!(
                    position = self.position,
                    "route incomplete with no moves left"
                );
                self.lost.raise();
                return;
            }
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id());
        ctx.haptics.off();
        self.flash.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

pub fn build_cipher_path_app() -> StateMachine<DeviceContext> {
    let meta = shared_meta();
    let mut machine = StateMachine::new(CIPHER_PATH_APP_ID);
    machine.push_state(Box::new(IntroState::new(
        INTRO_ID,
        "CIPHER PATH",
        "FIND THE ROUTE",
        meta.clone(),
    )));
    machine.push_state(Box::new(GameplayState::new(meta.clone())));
    machine.push_state(Box::new(EndState::new(
        meta.clone(),
        EndConfig::win(WIN_ID, "ROUTE TRACED"),
    )));
    machine.push_state(Box::new(EndState::new(
        meta,
        EndConfig::lose(LOSE_ID, "LOST IN THE MAZE"),
    )));
    machine
}

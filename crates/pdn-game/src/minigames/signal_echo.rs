//! Signal Echo. A button pattern flashes, the player plays it back.

use rand::Rng;

use pdn_core::prelude::*;
use pdn_core::{Flag, State, StateId, StateMachine, StateTransition, Timer, SIGNAL_ECHO_APP_ID};
use pdn_device::drivers::Button;
use pdn_device::DeviceContext;

use super::{shared_meta, EndConfig, EndState, IntroState, SharedMeta};

const INTRO_ID: StateId = StateId(300);
const GAMEPLAY_ID: StateId = StateId(301);
const WIN_ID: StateId = StateId(302);
const LOSE_ID: StateId = StateId(303);

const IDX_WIN: usize = 2;
const IDX_LOSE: usize = 3;

struct EchoConfig {
    rounds: u32,
    pattern_len: usize,
    show_ms: u64,
    input_window_ms: u64,
    misses_allowed: u32,
}

impl EchoConfig {
    fn for_mode(hard: bool) -> Self {
        if hard {
            Self {
                rounds: 5,
                pattern_len: 5,
                show_ms: 350,
                input_window_ms: 2500,
                misses_allowed: 0,
            }
        } else {
            Self {
                rounds: 3,
                pattern_len: 3,
                show_ms: 600,
                input_window_ms: 4000,
                misses_allowed: 1,
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Show { step: usize },
    Input { entered: usize },
}

struct GameplayState {
    meta: SharedMeta,
    config: EchoConfig,
    round: u32,
    misses: u32,
    pattern: Vec<Button>,
    phase: Phase,
    timer: Timer,
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
            config: EchoConfig::for_mode(false),
            round: 1,
            misses: 0,
            pattern: Vec::new(),
            phase: Phase::Show { step: 0 },
            timer: Timer::new(),
            won,
            lost,
            transitions,
        }
    }

    fn deal_pattern(&mut self, ctx: &mut DeviceContext) {
        self.pattern = (0..self.config.pattern_len)
            .map(|_| {
                if ctx.rng().gen_bool(0.5) {
                    Button::Primary
                } else {
                    Button::Secondary
                }
            })
            .collect();
    }

    fn start_show(&mut self, ctx: &mut DeviceContext) {
        self.phase = Phase::Show { step: 0 };
        self.timer.start(ctx.now_ms(), self.config.show_ms);
        self.draw_symbol(ctx, 0);
    }

    fn draw_symbol(&self, ctx: &mut DeviceContext, step: usize) {
        let glyph = match self.pattern[step] {
            Button::Primary => "[P]",
            Button::Secondary => "[S]",
        };
        ctx.display.clear();
        ctx.display
            .draw_text(0, 8, format!("ROUND {}/{}", self.round, self.config.rounds));
        ctx.display.draw_centered_text(24, "WATCH");
        ctx.display.draw_centered_text(44, glyph);
        ctx.display.render();
    }

    fn draw_input(&self, ctx: &mut DeviceContext, entered: usize) {
        let dots: String = (0..self.pattern.len())
            .map(|i| if i < entered { '#' } else { '.' })
            .collect();
        ctx.display.clear();
        ctx.display
            .draw_text(0, 8, format!("ROUND {}/{}", self.round, self.config.rounds));
        ctx.display.draw_centered_text(24, "ECHO IT");
        ctx.display.draw_centered_text(44, &dots);
        ctx.display.render();
    }

    /// A wrong press or a stalled window. Burns a miss and replays the same
    /// pattern unless the budget is gone.
    fn fail_round(&mut self, ctx: &mut DeviceContext) {
        self.misses += 1;
        ctx.haptics.set_intensity(200);
        if self.misses > self.config.misses_allowed {
            self.lost.raise();
        } else {
            self.start_show(ctx);
        }
    }
}

impl State<DeviceContext> for GameplayState {
    fn id(&self) -> StateId {
        GAMEPLAY_ID
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.won.lower();
        self.lost.lower();
        self.config = EchoConfig::for_mode(self.meta.borrow().hard);
        self.round = 1;
        self.misses = 0;
        ctx.buttons.claim(self.id());
        self.deal_pattern(ctx);
        self.start_show(ctx);
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        match self.phase {
            Phase::Show { step } => {
                // presses during the flash are noise
                while ctx.buttons.take_press(self.id()).is_some() {}
                if self.timer.expired(ctx.now_ms()) {
                    let next = step + 1;
                    if next >= self.pattern.len() {
                        ctx.haptics.off();
                        self.phase = Phase::Input { entered: 0 };
                        self.timer.start(ctx.now_ms(), self.config.input_window_ms);
                        self.draw_input(ctx, 0);
                    } else {
                        self.phase = Phase::Show { step: next };
                        self.timer.start(ctx.now_ms(), self.config.show_ms);
                        self.draw_symbol(ctx, next);
                    }
                }
            }
            Phase::Input { entered } => {
                while let Some(press) = ctx.buttons.take_press(self.id()) {
                    if press.button == self.pattern[entered] {
                        let next = entered + 1;
                        if next >= self.pattern.len() {
                            self.meta.borrow_mut().score += 100;
                            if self.round >= self.config.rounds {
                                self.won.raise();
                                return;
                            }
                            self.round += 1;
                            self.deal_pattern(ctx);
                            self.start_show(ctx);
                        } else {
                            self.phase = Phase::Input { entered: next };
                            self.draw_input(ctx, next);
                        }
                        return;
                    }
                    self.fail_round(ctx);
                    return;
                }
                if self.timer.expired(ctx.now_ms()) {
                    debug!(round = self.round, "echo window lapsed");
                    self.fail_round(ctx);
                }
            }
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id());
        ctx.haptics.off();
        self.timer.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

pub fn build_signal_echo_app() -> StateMachine<DeviceContext> {
    let meta = shared_meta();
    let mut machine = StateMachine::new(SIGNAL_ECHO_APP_ID);
    machine.push_state(Box::new(IntroState::new(
        INTRO_ID,
        "SIGNAL ECHO",
        "REPEAT THE CALL",
        meta.clone(),
    )));
    machine.push_state(Box::new(GameplayState::new(meta.clone())));
    machine.push_state(Box::new(EndState::new(
        meta.clone(),
        EndConfig::win(WIN_ID, "SIGNAL CLEAN"),
    )));
    machine.push_state(Box::new(EndState::new(
        meta,
        EndConfig::lose(LOSE_ID, "SIGNAL LOST"),
    )));
    machine
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdn_core::SimClock;
    use pdn_device::drivers::ButtonInteraction;
    use std::rc::Rc;
    use tempfile::tempdir;

    fn harness() -> (DeviceContext, SimClock, tempfile::TempDir) {
        let clock = SimClock::new();
        let dir = tempdir().unwrap();
        let mut ctx = DeviceContext::new("test", dir.path(), Rc::new(clock.clone())).unwrap();
        ctx.seed_rng(3);
        (ctx, clock, dir)
    }

    fn mounted() -> (GameplayState, DeviceContext, SimClock, tempfile::TempDir) {
        let (mut ctx, clock, dir) = harness();
        let mut state = GameplayState::new(shared_meta());
        state.on_mounted(&mut ctx);
        (state, ctx, clock, dir)
    }

    fn finish_show(state: &mut GameplayState, ctx: &mut DeviceContext, clock: &SimClock) {
        for _ in 0..state.pattern.len() {
            clock.advance(state.config.show_ms);
            state.on_loop(ctx);
        }
        assert!(matches!(state.phase, Phase::Input { .. }));
    }

    fn echo_pattern(state: &mut GameplayState, ctx: &mut DeviceContext) {
        for button in state.pattern.clone() {
            ctx.buttons.inject(button, ButtonInteraction::Click);
            state.on_loop(ctx);
        }
    }

    #[test]
    fn test_presses_during_the_flash_are_dropped() {
        let (mut state, mut ctx, _clock, _dir) = mounted();
        ctx.buttons.inject(Button::Primary, ButtonInteraction::Click);
        state.on_loop(&mut ctx);
        assert!(matches!(state.phase, Phase::Show { .. }));
        assert_eq!(state.misses, 0);
    }

    #[test]
    fn test_correct_echo_advances_the_round() {
        let (mut state, mut ctx, clock, _dir) = mounted();
        finish_show(&mut state, &mut ctx, &clock);
        echo_pattern(&mut state, &mut ctx);

        assert_eq!(state.round, 2);
        assert_eq!(state.meta.borrow().score, 100);
        assert!(matches!(state.phase, Phase::Show { step: 0 }));
    }

    #[test]
    fn test_three_clean_rounds_win() {
        let (mut state, mut ctx, clock, _dir) = mounted();
        for _ in 0..3 {
            finish_show(&mut state, &mut ctx, &clock);
            echo_pattern(&mut state, &mut ctx);
        }
        assert!(state.transitions()[1].is_satisfied());
        assert_eq!(state.transitions()[1].target(), IDX_WIN);
        assert_eq!(state.meta.borrow().score, 300);
    }

    #[test]
    fn test_easy_mode_forgives_one_miss() {
        let (mut state, mut ctx, clock, _dir) = mounted();
        finish_show(&mut state, &mut ctx, &clock);

        let wrong = match state.pattern[0] {
            Button::Primary => Button::Secondary,
            Button::Secondary => Button::Primary,
        };
        ctx.buttons.inject(wrong, ButtonInteraction::Click);
        state.on_loop(&mut ctx);
        assert_eq!(state.misses, 1);
        assert!(!state.transitions()[0].is_satisfied());
        // the same pattern replays from the top
        assert!(matches!(state.phase, Phase::Show { step: 0 }));

        finish_show(&mut state, &mut ctx, &clock);
        ctx.buttons.inject(wrong, ButtonInteraction::Click);
        state.on_loop(&mut ctx);
        assert!(state.transitions()[0].is_satisfied());
        assert_eq!(state.transitions()[0].target(), IDX_LOSE);
    }

    #[test]
    fn test_stalled_window_counts_as_a_miss() {
        let (mut state, mut ctx, clock, _dir) = mounted();
        finish_show(&mut state, &mut ctx, &clock);

        clock.advance(state.config.input_window_ms);
        state.on_loop(&mut ctx);
        assert_eq!(state.misses, 1);
    }
}

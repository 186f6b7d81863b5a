//! Exploit Sequencer. The payload order is on screen; key it in before the
//! window closes. One wrong key scrubs the whole run.

use rand::Rng;

use pdn_core::prelude::*;
use pdn_core::{
    Flag, State, StateId, StateMachine, StateTransition, Timer, EXPLOIT_SEQUENCER_APP_ID,
};
use pdn_device::drivers::Button;
use pdn_device::DeviceContext;

use crate::difficulty::Difficulty;

use super::{shared_meta, EndConfig, EndState, IntroState, SharedMeta};

const INTRO_ID: StateId = StateId(800);
const GAMEPLAY_ID: StateId = StateId(801);
const WIN_ID: StateId = StateId(802);
const LOSE_ID: StateId = StateId(803);

const IDX_WIN: usize = 2;
const IDX_LOSE: usize = 3;

struct SequencerConfig {
    sequence_len: usize,
    deadline_ms: u64,
    rounds: u32,
}

impl SequencerConfig {
    fn for_mode(hard: bool) -> Self {
        let d = Difficulty::from_hard_flag(hard);
        Self {
            sequence_len: d.lerp_usize(4, 6),
            deadline_ms: d.lerp_ms(6000, 4000),
            rounds: d.lerp_u32(3, 5),
        }
    }
}

struct GameplayState {
    meta: SharedMeta,
    config: SequencerConfig,
    sequence: Vec<Button>,
    entered: usize,
    round: u32,
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
            config: SequencerConfig::for_mode(false),
            sequence: Vec::new(),
            entered: 0,
            round: 1,
            deadline: Timer::new(),
            won,
            lost,
            transitions,
        }
    }

    fn deal_round(&mut self, ctx: &mut DeviceContext) {
        self.sequence = (0..self.config.sequence_len)
            .map(|_| {
                if ctx.rng().gen_bool(0.5) {
                    Button::Primary
                } else {
                    Button::Secondary
                }
            })
            .collect();
        self.entered = 0;
        self.deadline.start(ctx.now_ms(), self.config.deadline_ms);
        self.render(ctx);
    }

    fn render(&self, ctx: &mut DeviceContext) {
        let line: String = self
            .sequence
            .iter()
            .enumerate()
            .map(|(i, button)| {
                if i < self.entered {
                    "# "
                } else {
                    match button {
                        Button::Primary => "P ",
                        Button::Secondary => "S ",
                    }
                }
            })
            .collect();
        ctx.display.clear();
        ctx.display.draw_text(
            0,
            8,
            format!("INJECT {}/{}", self.round, self.config.rounds),
        );
        ctx.display.draw_centered_text(32, line.trim_end());
        ctx.display.draw_centered_text(52, "KEY IT IN");
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
        self.config = SequencerConfig::for_mode(self.meta.borrow().hard);
        self.round = 1;
        ctx.buttons.claim(self.id());
        self.deal_round(ctx);
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        while let Some(press) = ctx.buttons.take_press(self.id()) {
            if press.button != self.sequence[self.entered] {
                debug!(round = self.round, step = self.entered, "payload scrubbed");
                ctx.haptics.set_intensity(255);
                self.lost.raise();
                return;
            }
            self.entered += 1;
            if self.entered >= self.sequence.len() {
                self.meta.borrow_mut().score += 100;
                if self.round >= self.config.rounds {
                    self.won.raise();
                    return;
                }
                self.round += 1;
                self.deal_round(ctx);
            } else {
                self.render(ctx);
            }
        }

        if self.deadline.expired(ctx.now_ms()) {
            debug!(round = self.round, "injection window closed");
            self.lost.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id());
        ctx.haptics.off();
        self.deadline.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

pub fn build_exploit_sequencer_app() -> StateMachine<DeviceContext> {
    let meta = shared_meta();
    let mut machine = StateMachine::new(EXPLOIT_SEQUENCER_APP_ID);
    machine.push_state(Box::new(IntroState::new(
        INTRO_ID,
        "EXPLOIT SEQUENCER",
        "KEY THE PAYLOAD",
        meta.clone(),
    )));
    machine.push_state(Box::new(GameplayState::new(meta.clone())));
    machine.push_state(Box::new(EndState::new(
        meta.clone(),
        EndConfig::win(WIN_ID, "PAYLOAD SENT"),
    )));
    machine.push_state(Box::new(EndState::new(
        meta,
        EndConfig::lose(LOSE_ID, "SCRUBBED"),
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
        ctx.seed_rng(13);
        (ctx, clock, dir)
    }

    fn mounted() -> (GameplayState, DeviceContext, SimClock, tempfile::TempDir) {
        let (mut ctx, clock, dir) = harness();
        let mut state = GameplayState::new(shared_meta());
        state.on_mounted(&mut ctx);
        (state, ctx, clock, dir)
    }

    fn key_sequence(state: &mut GameplayState, ctx: &mut DeviceContext) {
        for button in state.sequence.clone() {
            ctx.buttons.inject(button, ButtonInteraction::Click);
            state.on_loop(ctx);
        }
    }

    #[test]
    fn test_three_payloads_win_on_easy() {
        let (mut state, mut ctx, _clock, _dir) = mounted();
        for _ in 0..3 {
            key_sequence(&mut state, &mut ctx);
        }
        assert!(state.transitions()[1].is_satisfied());
        assert_eq!(state.transitions()[1].target(), IDX_WIN);
        assert_eq!(state.meta.borrow().score, 300);
    }

    #[test]
    fn test_one_wrong_key_loses() {
        let (mut state, mut ctx, _clock, _dir) = mounted();
        let wrong = match state.sequence[0] {
            Button::Primary => Button::Secondary,
            Button::Secondary => Button::Primary,
        };
        ctx.buttons.inject(wrong, ButtonInteraction::Click);
        state.on_loop(&mut ctx);
        assert!(state.transitions()[0].is_satisfied());
        assert_eq!(state.transitions()[0].target(), IDX_LOSE);
    }

    #[test]
    fn test_missing_the_deadline_loses() {
        let (mut state, mut ctx, clock, _dir) = mounted();
        clock.advance(state.config.deadline_ms);
        state.on_loop(&mut ctx);
        assert!(state.transitions()[0].is_satisfied());
    }

    #[test]
    fn test_each_round_restarts_the_clock() {
        let (mut state, mut ctx, clock, _dir) = mounted();
        clock.advance(state.config.deadline_ms - 100);
        key_sequence(&mut state, &mut ctx);
        assert_eq!(state.round, 2);

        // fresh window for the new round
        clock.advance(state.config.deadline_ms - 100);
        state.on_loop(&mut ctx);
        assert!(!state.transitions()[0].is_satisfied());
    }
}

//! Spike Vector. Walls with one safe gap scroll down the track; the cursor
//! slides between lanes. Five levels, each faster than the last.

use std::cell::RefCell;
use std::rc::Rc;

use rand::Rng;

use pdn_core::prelude::*;
use pdn_core::{Flag, State, StateId, StateMachine, StateTransition, Timer, SPIKE_VECTOR_APP_ID};
use pdn_device::drivers::Button;
use pdn_device::DeviceContext;

use super::{shared_meta, EndConfig, EndState, IntroState, SharedMeta};

const INTRO_ID: StateId = StateId(500);
const WIN_ID: StateId = StateId(501);
const LOSE_ID: StateId = StateId(502);
const SHOW_ID: StateId = StateId(503);
const GAMEPLAY_ID: StateId = StateId(504);
const EVALUATE_ID: StateId = StateId(505);

const IDX_SHOW: usize = 1;
const IDX_GAMEPLAY: usize = 2;
const IDX_EVALUATE: usize = 3;
const IDX_WIN: usize = 4;
const IDX_LOSE: usize = 5;

/// Wall travel time per step, indexed by absolute speed rank
const SPEED_TABLE_MS: [u64; 8] = [60, 52, 45, 37, 30, 25, 20, 15];
const TRACK_STEPS: u32 = 12;
const SHOW_DWELL_MS: u64 = 1500;
const FLASH_MS: u64 = 150;
const FLASH_COUNT: u8 = 4;

#[derive(Clone, Copy)]
struct SpikeConfig {
    lanes: u8,
    levels: usize,
    walls_min: usize,
    walls_max: usize,
    speed_offset: usize,
    hits_allowed: u32,
    start_lane: u8,
}

impl SpikeConfig {
    fn easy() -> Self {
        Self {
            lanes: 5,
            levels: 5,
            walls_min: 5,
            walls_max: 8,
            speed_offset: 0,
            hits_allowed: 3,
            start_lane: 2,
        }
    }

    fn hard() -> Self {
        Self {
            lanes: 7,
            levels: 5,
            walls_min: 8,
            walls_max: 12,
            speed_offset: 3,
            hits_allowed: 1,
            start_lane: 3,
        }
    }

    fn for_mode(hard: bool) -> Self {
        if hard {
            Self::hard()
        } else {
            Self::easy()
        }
    }

    fn level_speed_ms(&self, level: usize) -> u64 {
        SPEED_TABLE_MS[(self.speed_offset + level).min(SPEED_TABLE_MS.len() - 1)]
    }
}

/// Session board shared by Show, Gameplay and Evaluate
struct SpikeBoard {
    config: SpikeConfig,
    level: usize,
    hits: u32,
    lane: u8,
    gaps: Vec<u8>,
}

type SharedBoard = Rc<RefCell<SpikeBoard>>;

impl SpikeBoard {
    fn new() -> Self {
        Self {
            config: SpikeConfig::easy(),
            level: 0,
            hits: 0,
            lane: SpikeConfig::easy().start_lane,
            gaps: Vec::new(),
        }
    }

    fn reset(&mut self, hard: bool) {
        self.config = SpikeConfig::for_mode(hard);
        self.level = 0;
        self.hits = 0;
        self.lane = self.config.start_lane;
        self.gaps.clear();
    }
}

// ─────────────────────────────────────────────────────────────────
// Show
// ─────────────────────────────────────────────────────────────────

/// Level banner. Rolls the level's gap sequence while the banner shows.
struct ShowState {
    board: SharedBoard,
    dwell: Timer,
    to_play: Flag,
    transitions: Vec<StateTransition>,
}

impl ShowState {
    fn new(board: SharedBoard) -> Self {
        let to_play = Flag::new();
        let transitions = vec![StateTransition::when(&to_play, IDX_GAMEPLAY)];
        Self {
            board,
            dwell: Timer::new(),
            to_play,
            transitions,
        }
    }
}

impl State<DeviceContext> for ShowState {
    fn id(&self) -> StateId {
        SHOW_ID
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.to_play.lower();
        let (level, walls) = {
            let mut board = self.board.borrow_mut();
            let config = board.config;
            let count = ctx.rng().gen_range(config.walls_min..=config.walls_max);
            board.gaps = (0..count)
                .map(|_| ctx.rng().gen_range(0..config.lanes))
                .collect();
            (board.level, count)
        };
        debug!(level, walls, "level dealt");

        self.dwell.start(ctx.now_ms(), SHOW_DWELL_MS);
        ctx.display.clear();
        ctx.display
            .draw_centered_text(20, format!("LEVEL {}", level + 1));
        ctx.display
            .draw_centered_text(40, format!("{walls} WALLS"));
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if self.dwell.expired(ctx.now_ms()) {
            self.to_play.raise();
        }
    }

    fn on_dismounted(&mut self, _ctx: &mut DeviceContext) {
        self.dwell.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// Gameplay
// ─────────────────────────────────────────────────────────────────

struct GameplayState {
    meta: SharedMeta,
    board: SharedBoard,
    wall_index: usize,
    wall_row: u32,
    step: Timer,
    done: Flag,
    transitions: Vec<StateTransition>,
}

impl GameplayState {
    fn new(meta: SharedMeta, board: SharedBoard) -> Self {
        let done = Flag::new();
        let transitions = vec![StateTransition::when(&done, IDX_EVALUATE)];
        Self {
            meta,
            board,
            wall_index: 0,
            wall_row: 0,
            step: Timer::new(),
            done,
            transitions,
        }
    }

    fn render(&self, ctx: &mut DeviceContext) {
        let board = self.board.borrow();
        let config = board.config;
        let lane_x = |lane: u8| 12 + i32::from(lane) * 14;

        ctx.display.clear();
        ctx.display.draw_text(
            0,
            6,
            format!(
                "L{} W{}/{} H{}",
                board.level + 1,
                self.wall_index + 1,
                board.gaps.len(),
                board.hits
            ),
        );
        if let Some(&gap) = board.gaps.get(self.wall_index) {
            let y = 10 + (self.wall_row * 4) as i32;
            for lane in 0..config.lanes {
                if lane != gap {
                    ctx.display.draw_text(lane_x(lane), y, "#");
                }
            }
        }
        ctx.display.draw_text(lane_x(board.lane), 62, "^");
        ctx.display.render();
    }
}

impl State<DeviceContext> for GameplayState {
    fn id(&self) -> StateId {
        GAMEPLAY_ID
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.done.lower();
        self.wall_index = 0;
        self.wall_row = 0;
        ctx.buttons.claim(self.id());
        let speed = {
            let board = self.board.borrow();
            board.config.level_speed_ms(board.level)
        };
        self.step.start(ctx.now_ms(), speed);
        self.render(ctx);
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        while let Some(press) = ctx.buttons.take_press(self.id()) {
            let mut board = self.board.borrow_mut();
            match press.button {
                Button::Primary => board.lane = board.lane.saturating_sub(1),
                Button::Secondary => {
                    board.lane = (board.lane + 1).min(board.config.lanes - 1)
                }
            }
        }

        if self.step.expired(ctx.now_ms()) {
            self.wall_row += 1;
            let speed = {
                let board = self.board.borrow();
                board.config.level_speed_ms(board.level)
            };
            self.step.start(ctx.now_ms(), speed);

            if self.wall_row >= TRACK_STEPS {
                let (passed, level_done, busted) = {
                    let mut board = self.board.borrow_mut();
                    let gap = board.gaps[self.wall_index];
                    let passed = board.lane == gap;
                    if !passed {
                        board.hits += 1;
                    }
                    let busted = board.hits > board.config.hits_allowed;
                    (passed, self.wall_index + 1 >= board.gaps.len(), busted)
                };
                if passed {
                    self.meta.borrow_mut().score += 100;
                } else {
                    ctx.haptics.set_intensity(200);
                }
                self.wall_index += 1;
                self.wall_row = 0;
                if busted || level_done {
                    self.done.raise();
                    return;
                }
            }
        }

        self.render(ctx);
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id());
        ctx.haptics.off();
        self.step.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// Evaluate
// ─────────────────────────────────────────────────────────────────

/// Level pips flash, then the board routes forward
struct EvaluateState {
    board: SharedBoard,
    flash: Timer,
    flashes: u8,
    to_show: Flag,
    to_win: Flag,
    to_lose: Flag,
    transitions: Vec<StateTransition>,
}

impl EvaluateState {
    fn new(board: SharedBoard) -> Self {
        let to_show = Flag::new();
        let to_win = Flag::new();
        let to_lose = Flag::new();
        let transitions = vec![
            StateTransition::when(&to_lose, IDX_LOSE),
            StateTransition::when(&to_win, IDX_WIN),
            StateTransition::when(&to_show, IDX_SHOW),
        ];
        Self {
            board,
            flash: Timer::new(),
            flashes: 0,
            to_show,
            to_win,
            to_lose,
            transitions,
        }
    }

    fn draw_pips(&self, ctx: &mut DeviceContext, lit: bool) {
        let board = self.board.borrow();
        let pips: String = (0..board.config.levels)
            .map(|i| {
                if i <= board.level && lit {
                    '#'
                } else {
                    '.'
                }
            })
            .collect();
        ctx.display.clear();
        ctx.display.draw_centered_text(24, "SECTOR SWEEP");
        ctx.display.draw_centered_text(40, &pips);
        ctx.display.render();
    }
}

impl State<DeviceContext> for EvaluateState {
    fn id(&self) -> StateId {
        EVALUATE_ID
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.to_show.lower();
        self.to_win.lower();
        self.to_lose.lower();
        self.flashes = 0;
        ctx.haptics.off();
        self.flash.start(ctx.now_ms(), FLASH_MS);
        self.draw_pips(ctx, true);
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if !self.flash.expired(ctx.now_ms()) {
            return;
        }
        self.flashes += 1;
        if self.flashes < FLASH_COUNT {
            self.draw_pips(ctx, self.flashes % 2 == 0);
            self.flash.start(ctx.now_ms(), FLASH_MS);
            return;
        }

        // routing runs once per visit
        self.flash.invalidate();
        let mut board = self.board.borrow_mut();
        if board.hits > board.config.hits_allowed {
            self.to_lose.raise();
        } else if board.level + 1 >= board.config.levels {
            self.to_win.raise();
        } else {
            board.level += 1;
            self.to_show.raise();
        }
    }

    fn on_dismounted(&mut self, _ctx: &mut DeviceContext) {
        self.flash.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

pub fn build_spike_vector_app() -> StateMachine<DeviceContext> {
    let meta = shared_meta();
    let board: SharedBoard = Rc::new(RefCell::new(SpikeBoard::new()));
    let reset_board = board.clone();
    let mut machine = StateMachine::new(SPIKE_VECTOR_APP_ID);
    machine.push_state(Box::new(
        IntroState::new(INTRO_ID, "SPIKE VECTOR", "RIDE THE GAPS", meta.clone())
            .with_reset(move |hard| reset_board.borrow_mut().reset(hard)),
    ));
    machine.push_state(Box::new(ShowState::new(board.clone())));
    machine.push_state(Box::new(GameplayState::new(meta.clone(), board.clone())));
    machine.push_state(Box::new(EvaluateState::new(board)));
    machine.push_state(Box::new(EndState::new(
        meta.clone(),
        EndConfig::win(WIN_ID, "VECTOR CLEAR"),
    )));
    machine.push_state(Box::new(EndState::new(
        meta,
        EndConfig::lose(LOSE_ID, "SPIKED"),
    )));
    machine
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdn_core::SimClock;
    use tempfile::tempdir;

    fn harness() -> (DeviceContext, SimClock, tempfile::TempDir) {
        let clock = SimClock::new();
        let dir = tempdir().unwrap();
        let mut ctx = DeviceContext::new("test", dir.path(), Rc::new(clock.clone())).unwrap();
        ctx.seed_rng(11);
        (ctx, clock, dir)
    }

    fn board_with_gaps(gaps: Vec<u8>) -> SharedBoard {
        let mut board = SpikeBoard::new();
        board.reset(false);
        board.gaps = gaps;
        Rc::new(RefCell::new(board))
    }

    fn scroll_one_wall(state: &mut GameplayState, ctx: &mut DeviceContext, clock: &SimClock) {
        // level 0 easy speed is 60ms, twelve steps per wall
        for _ in 0..TRACK_STEPS {
            clock.advance(60);
            state.on_loop(ctx);
        }
    }

    #[test]
    fn test_show_deals_gaps_within_config() {
        let (mut ctx, _clock, _dir) = harness();
        let board = board_with_gaps(Vec::new());
        let mut show = ShowState::new(board.clone());
        show.on_mounted(&mut ctx);

        let board = board.borrow();
        let config = board.config;
        assert!(board.gaps.len() >= config.walls_min);
        assert!(board.gaps.len() <= config.walls_max);
        assert!(board.gaps.iter().all(|&g| g < config.lanes));
    }

    #[test]
    fn test_riding_the_gap_scores() {
        let (mut ctx, clock, _dir) = harness();
        let meta = shared_meta();
        let board = board_with_gaps(vec![2, 2]);
        board.borrow_mut().lane = 2;
        let mut state = GameplayState::new(meta.clone(), board.clone());

        state.on_mounted(&mut ctx);
        scroll_one_wall(&mut state, &mut ctx, &clock);

        assert_eq!(meta.borrow().score, 100);
        assert_eq!(board.borrow().hits, 0);
        assert!(!state.transitions()[0].is_satisfied());

        scroll_one_wall(&mut state, &mut ctx, &clock);
        assert_eq!(meta.borrow().score, 200);
        // last wall of the level hands over to evaluate
        assert!(state.transitions()[0].is_satisfied());
    }

    #[test]
    fn test_missing_the_gap_costs_a_hit() {
        let (mut ctx, clock, _dir) = harness();
        let meta = shared_meta();
        let board = board_with_gaps(vec![0, 1]);
        board.borrow_mut().lane = 4;
        let mut state = GameplayState::new(meta.clone(), board.clone());

        state.on_mounted(&mut ctx);
        scroll_one_wall(&mut state, &mut ctx, &clock);

        assert_eq!(board.borrow().hits, 1);
        assert_eq!(meta.borrow().score, 0);
    }

    #[test]
    fn test_evaluate_routes_by_board() {
        let (mut ctx, clock, _dir) = harness();

        // hits over the cap: lose
        let board = board_with_gaps(vec![0]);
        board.borrow_mut().hits = 4;
        let mut eval = EvaluateState::new(board);
        eval.on_mounted(&mut ctx);
        for _ in 0..FLASH_COUNT {
            clock.advance(FLASH_MS);
            eval.on_loop(&mut ctx);
        }
        assert!(eval.transitions()[0].is_satisfied());
        assert_eq!(eval.transitions()[0].target(), IDX_LOSE);

        // clean mid-run level: next show, level bumped
        let board = board_with_gaps(vec![0]);
        board.borrow_mut().level = 1;
        let mut eval = EvaluateState::new(board.clone());
        eval.on_mounted(&mut ctx);
        for _ in 0..FLASH_COUNT {
            clock.advance(FLASH_MS);
            eval.on_loop(&mut ctx);
        }
        assert!(eval.transitions()[2].is_satisfied());
        assert_eq!(board.borrow().level, 2);

        // final level clean: win
        let board = board_with_gaps(vec![0]);
        board.borrow_mut().level = 4;
        let mut eval = EvaluateState::new(board);
        eval.on_mounted(&mut ctx);
        for _ in 0..FLASH_COUNT {
            clock.advance(FLASH_MS);
            eval.on_loop(&mut ctx);
        }
        assert!(eval.transitions()[1].is_satisfied());
        assert_eq!(eval.transitions()[1].target(), IDX_WIN);
    }
}

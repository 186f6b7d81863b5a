//! Breach Defense. Threats crawl toward the defense line on their own
//! timers; the shield covers one lane at a time.

use rand::Rng;

use pdn_core::prelude::*;
use pdn_core::{Flag, State, StateId, StateMachine, StateTransition, Timer, BREACH_DEFENSE_APP_ID};
use pdn_device::drivers::Button;
use pdn_device::DeviceContext;

use super::{shared_meta, EndConfig, EndState, IntroState, SharedMeta};

const INTRO_ID: StateId = StateId(900);
const GAMEPLAY_ID: StateId = StateId(901);
const WIN_ID: StateId = StateId(902);
const LOSE_ID: StateId = StateId(903);

const IDX_WIN: usize = 2;
const IDX_LOSE: usize = 3;

const MAX_SLOTS: usize = 3;
const FEEDBACK_BUZZ_MS: u64 = 150;

struct BreachConfig {
    num_lanes: u8,
    threat_speed_ms: u64,
    threat_distance: u32,
    total_threats: u32,
    misses_allowed: u32,
    spawn_interval_ms: u64,
    max_overlap: usize,
}

impl BreachConfig {
    fn easy() -> Self {
        Self {
            num_lanes: 3,
            threat_speed_ms: 40,
            threat_distance: 100,
            total_threats: 6,
            misses_allowed: 3,
            spawn_interval_ms: 1500,
            max_overlap: 2,
        }
    }

    fn hard() -> Self {
        Self {
            num_lanes: 5,
            threat_speed_ms: 20,
            threat_distance: 100,
            total_threats: 12,
            misses_allowed: 1,
            spawn_interval_ms: 700,
            max_overlap: 3,
        }
    }

    fn for_mode(hard: bool) -> Self {
        if hard {
            Self::hard()
        } else {
            Self::easy()
        }
    }
}

#[derive(Default)]
struct ThreatSlot {
    active: bool,
    lane: u8,
    position: u32,
    step: Timer,
}

struct GameplayState {
    meta: SharedMeta,
    config: BreachConfig,
    shield_lane: u8,
    slots: [ThreatSlot; MAX_SLOTS],
    spawn: Timer,
    feedback: Timer,
    next_spawn_index: u32,
    threats_resolved: u32,
    breaches: u32,
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
            config: BreachConfig::easy(),
            shield_lane: 0,
            slots: Default::default(),
            spawn: Timer::new(),
            feedback: Timer::new(),
            next_spawn_index: 0,
            threats_resolved: 0,
            breaches: 0,
            won,
            lost,
            transitions,
        }
    }

    fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }

    fn spawn_threat(&mut self, ctx: &mut DeviceContext) {
        if self.next_spawn_index >= self.config.total_threats {
            return;
        }
        if self.active_count() >= self.config.max_overlap {
            return;
        }
        let Some(slot) = self.slots.iter_mut().find(|s| !s.active) else {
            return;
        };
        slot.active = true;
        slot.lane = ctx.rng().gen_range(0..self.config.num_lanes);
        slot.position = 0;
        slot.step.start(ctx.now_ms(), self.config.threat_speed_ms);
        self.next_spawn_index += 1;
        trace!(
            index = self.next_spawn_index,
            lane = slot.lane,
            "threat spawned"
        );
    }

    fn advance_threats(&mut self, ctx: &mut DeviceContext) {
        let now = ctx.now_ms();
        for i in 0..MAX_SLOTS {
            if !self.slots[i].active {
                continue;
            }
            if self.slots[i].step.expired(now) {
                self.slots[i].position += 1;
                self.slots[i].step.start(now, self.config.threat_speed_ms);
            }
            if self.slots[i].position >= self.config.threat_distance {
                let lane = self.slots[i].lane;
                self.resolve_threat(ctx, lane);
                self.slots[i].active = false;
                self.slots[i].step.invalidate();
            }
        }
    }

    fn resolve_threat(&mut self, ctx: &mut DeviceContext, lane: u8) {
        self.threats_resolved += 1;
        if lane == self.shield_lane {
            self.meta.borrow_mut().score += 100;
            ctx.haptics.set_intensity(150);
        } else {
            self.breaches += 1;
            ctx.haptics.set_intensity(255);
        }
        self.feedback.start(ctx.now_ms(), FEEDBACK_BUZZ_MS);
    }

    fn render_hud(&self, ctx: &mut DeviceContext) {
        let score = self.meta.borrow().score;
        ctx.display.clear();
        ctx.display.draw_text(
            0,
            8,
            format!(
                "T {}/{}  B {}/{}",
                self.threats_resolved,
                self.config.total_threats,
                self.breaches,
                self.config.misses_allowed
            ),
        );
        ctx.display.draw_text(96, 8, format!("{score}"));

        for lane in 0..self.config.num_lanes {
            let y = 20 + i32::from(lane) * 10;
            if lane == self.shield_lane {
                ctx.display.draw_filled_box(110, y - 6, 4, 8);
            } else {
                ctx.display.draw_frame(110, y - 6, 4, 8);
            }
            for slot in self.slots.iter().filter(|s| s.active && s.lane == lane) {
                let x = (slot.position * 104 / self.config.threat_distance) as i32;
                ctx.display.draw_text(x, y, ">");
            }
        }
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
        self.config = BreachConfig::for_mode(self.meta.borrow().hard);
        self.shield_lane = self.config.num_lanes / 2;
        self.slots = Default::default();
        self.next_spawn_index = 0;
        self.threats_resolved = 0;
        self.breaches = 0;
        ctx.buttons.claim(self.id());
        ctx.lights.clear();

        // the first threat is already inbound when the screen appears
        self.spawn_threat(ctx);
        self.spawn.start(ctx.now_ms(), self.config.spawn_interval_ms);
        self.render_hud(ctx);
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if self.feedback.is_running() && self.feedback.expired(ctx.now_ms()) {
            ctx.haptics.off();
            self.feedback.invalidate();
        }

        while let Some(press) = ctx.buttons.take_press(self.id()) {
            match press.button {
                Button::Primary => self.shield_lane = self.shield_lane.saturating_sub(1),
                Button::Secondary => {
                    self.shield_lane = (self.shield_lane + 1).min(self.config.num_lanes - 1)
                }
            }
        }

        if self.spawn.expired(ctx.now_ms()) {
            self.spawn_threat(ctx);
            self.spawn.start(ctx.now_ms(), self.config.spawn_interval_ms);
        }

        self.advance_threats(ctx);

        if self.breaches > self.config.misses_allowed {
            self.lost.raise();
            return;
        }
        if self.threats_resolved >= self.config.total_threats {
            self.won.raise();
            return;
        }

        self.render_hud(ctx);
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id());
        ctx.haptics.off();
        self.spawn.invalidate();
        self.feedback.invalidate();
        for slot in &mut self.slots {
            slot.active = false;
            slot.step.invalidate();
        }
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

pub fn build_breach_defense_app() -> StateMachine<DeviceContext> {
    let meta = shared_meta();
    let mut machine = StateMachine::new(BREACH_DEFENSE_APP_ID);
    machine.push_state(Box::new(IntroState::new(
        INTRO_ID,
        "BREACH DEFENSE",
        "HOLD THE LINE",
        meta.clone(),
    )));
    machine.push_state(Box::new(GameplayState::new(meta.clone())));
    machine.push_state(Box::new(EndState::new(
        meta.clone(),
        EndConfig::win(WIN_ID, "LINE HELD"),
    )));
    machine.push_state(Box::new(EndState::new(
        meta,
        EndConfig::lose(LOSE_ID, "BREACHED").with_detail("THE LINE FELL"),
    )));
    machine
}

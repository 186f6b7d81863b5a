//! Integration tests for the device app lifecycle
//!
//! Exercises the full stack: state machines in the app table, driver access
//! through the context, app switching, and two devices talking over a cable.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use pdn_core::{SimClock, Snapshot, State, StateId, StateMachine, Timer};
use pdn_device::{AppConfig, CableLink, Device, DeviceContext, Message};

fn sim_device(id: &str) -> (Device, SimClock, TempDir) {
    let dir = TempDir::new().unwrap();
    let clock = SimClock::default();
    let ctx = DeviceContext::new(id, dir.path().join("flash"), Rc::new(clock.clone())).unwrap();
    (Device::new(ctx), clock, dir)
}

/// Counts its loops; suspends with the count and restores it on resume
struct TallyState {
    id: StateId,
    loops: Rc<RefCell<u32>>,
}

#[derive(Serialize, Deserialize)]
struct TallySnapshot {
    loops: u32,
}

impl State<DeviceContext> for TallyState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, _ctx: &mut DeviceContext) {
        *self.loops.borrow_mut() = 0;
    }

    fn on_loop(&mut self, _ctx: &mut DeviceContext) {
        *self.loops.borrow_mut() += 1;
    }

    fn on_dismounted(&mut self, _ctx: &mut DeviceContext) {}

    fn on_paused(&mut self, _ctx: &mut DeviceContext) -> Option<Snapshot> {
        Snapshot::capture(
            self.id,
            &TallySnapshot {
                loops: *self.loops.borrow(),
            },
        )
    }

    fn on_resumed(&mut self, _ctx: &mut DeviceContext, snapshot: Option<Snapshot>) {
        if let Some(saved) = snapshot.and_then(|s| s.restore::<TallySnapshot>(self.id)) {
            *self.loops.borrow_mut() = saved.loops;
        }
    }
}

/// Echoes every received line back with a reply, counting exchanges
struct PingState {
    id: StateId,
    sends: Rc<RefCell<u32>>,
    receipts: Rc<RefCell<Vec<Message>>>,
    fire_timer: Timer,
}

impl State<DeviceContext> for PingState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.fire_timer.start(ctx.now_ms(), 50);
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if self.fire_timer.expired(ctx.now_ms()) {
            self.fire_timer.invalidate();
            if ctx.link.send(&Message::Fack).is_ok() {
                *self.sends.borrow_mut() += 1;
            }
        }
        while let Some(message) = ctx.link.recv() {
            self.receipts.borrow_mut().push(message);
        }
    }

    fn on_dismounted(&mut self, _ctx: &mut DeviceContext) {}
}

fn tally_app(app_id: u16, state_id: u16) -> (StateMachine<DeviceContext>, Rc<RefCell<u32>>) {
    let loops = Rc::new(RefCell::new(0));
    let mut machine = StateMachine::new(StateId(app_id));
    machine.push_state(Box::new(TallyState {
        id: StateId(state_id),
        loops: loops.clone(),
    }));
    (machine, loops)
}

// ═══════════════════════════════════════════════════════════════
// Single-device lifecycle
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_device_loops_without_apps() {
    let (mut device, clock, _dir) = sim_device("solo");

    for _ in 0..100 {
        clock.advance(10);
        device.tick();
    }

    assert_eq!(device.active_app(), None);
    assert_eq!(device.active_state_id(), None);
}

#[test]
fn test_active_app_runs_every_tick() {
    let (mut device, _clock, _dir) = sim_device("solo");
    let (machine, loops) = tally_app(1, 10);

    let mut config = AppConfig::new();
    config.register(machine);
    device.load_app_config(config);
    device.set_active_app(StateId(1));

    for _ in 0..25 {
        device.tick();
    }
    assert_eq!(*loops.borrow(), 25);
}

#[test]
fn test_suspended_app_resumes_with_its_state() {
    let (mut device, _clock, _dir) = sim_device("solo");
    let (first, first_loops) = tally_app(1, 10);
    let (second, _second_loops) = tally_app(2, 20);

    let mut config = AppConfig::new();
    config.register(first);
    config.register(second);
    device.load_app_config(config);

    device.set_active_app(StateId(1));
    for _ in 0..7 {
        device.tick();
    }
    device.set_active_app(StateId(2));
    device.tick();
    device.tick();
    device.return_to_previous_app();
    device.tick();

    // 7 before the switch, snapshot round trip, 1 after
    assert_eq!(*first_loops.borrow(), 8);
}

#[test]
fn test_unknown_app_request_leaves_device_running() {
    let (mut device, _clock, _dir) = sim_device("solo");
    let (machine, loops) = tally_app(1, 10);

    let mut config = AppConfig::new();
    config.register(machine);
    device.load_app_config(config);
    device.set_active_app(StateId(1));

    device.set_active_app(StateId(404));
    device.tick();

    assert_eq!(device.active_app(), Some(StateId(1)));
    assert_eq!(*loops.borrow(), 1);
}

#[test]
fn test_shutdown_quiesces_everything() {
    let (mut device, _clock, _dir) = sim_device("solo");
    let (machine, _loops) = tally_app(1, 10);

    let mut config = AppConfig::new();
    config.register(machine);
    device.load_app_config(config);
    device.set_active_app(StateId(1));
    device.ctx.haptics.set_intensity(128);

    device.shutdown();

    assert_eq!(device.active_app(), None);
    assert_eq!(device.ctx.haptics.intensity(), 0);
    assert!(!device.ctx.lights.is_animating());
    assert_eq!(device.ctx.display.screen_text(), "");
}

// ═══════════════════════════════════════════════════════════════
// Multiple devices
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_two_devices_are_fully_independent() {
    let (mut left, _lc, _ld) = sim_device("left");
    let (mut right, _rc, _rd) = sim_device("right");

    let (machine_l, loops_l) = tally_app(1, 10);
    let (machine_r, loops_r) = tally_app(1, 10);

    let mut config_l = AppConfig::new();
    config_l.register(machine_l);
    left.load_app_config(config_l);
    left.set_active_app(StateId(1));

    let mut config_r = AppConfig::new();
    config_r.register(machine_r);
    right.load_app_config(config_r);
    right.set_active_app(StateId(1));

    for _ in 0..5 {
        left.tick();
    }
    right.tick();

    assert_eq!(*loops_l.borrow(), 5);
    assert_eq!(*loops_r.borrow(), 1);
}

#[test]
fn test_paired_devices_exchange_messages() {
    let (mut left, left_clock, _ld) = sim_device("left");
    let (mut right, right_clock, _rd) = sim_device("right");

    let (a, b) = CableLink::pair();
    left.ctx.link = a;
    right.ctx.link = b;

    let left_receipts = Rc::new(RefCell::new(Vec::new()));
    let right_receipts = Rc::new(RefCell::new(Vec::new()));
    let left_sends = Rc::new(RefCell::new(0));
    let right_sends = Rc::new(RefCell::new(0));

    let mut left_app = StateMachine::new(StateId(1));
    left_app.push_state(Box::new(PingState {
        id: StateId(10),
        sends: left_sends.clone(),
        receipts: left_receipts.clone(),
        fire_timer: Timer::default(),
    }));
    let mut left_config = AppConfig::new();
    left_config.register(left_app);
    left.load_app_config(left_config);
    left.set_active_app(StateId(1));

    let mut right_app = StateMachine::new(StateId(1));
    right_app.push_state(Box::new(PingState {
        id: StateId(10),
        sends: right_sends.clone(),
        receipts: right_receipts.clone(),
        fire_timer: Timer::default(),
    }));
    let mut right_config = AppConfig::new();
    right_config.register(right_app);
    right.load_app_config(right_config);
    right.set_active_app(StateId(1));

    // run both in lockstep past the 50ms send deadline
    for _ in 0..10 {
        left_clock.advance(10);
        right_clock.advance(10);
        left.tick();
        right.tick();
    }

    assert_eq!(*left_sends.borrow(), 1);
    assert_eq!(*right_sends.borrow(), 1);
    assert_eq!(left_receipts.borrow().as_slice(), &[Message::Fack]);
    assert_eq!(right_receipts.borrow().as_slice(), &[Message::Fack]);
}

#[test]
fn test_sever_stops_traffic_for_both_ends() {
    let (mut left, left_clock, _ld) = sim_device("left");
    let (mut right, _right_clock, _rd) = sim_device("right");

    let (a, b) = CableLink::pair();
    left.ctx.link = a;
    right.ctx.link = b;

    let receipts = Rc::new(RefCell::new(Vec::new()));
    let sends = Rc::new(RefCell::new(0));

    let mut app = StateMachine::new(StateId(1));
    app.push_state(Box::new(PingState {
        id: StateId(10),
        sends: sends.clone(),
        receipts: receipts.clone(),
        fire_timer: Timer::default(),
    }));
    let mut config = AppConfig::new();
    config.register(app);
    left.load_app_config(config);
    left.set_active_app(StateId(1));

    right.ctx.link.sever();
    left_clock.advance(100);
    left.tick();

    // send failed on the dead link, nothing counted
    assert_eq!(*sends.borrow(), 0);
    assert!(!left.ctx.link.is_connected());
}

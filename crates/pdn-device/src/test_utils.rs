//! Test harness for driving simulated devices
//!
//! `TestDevice` wraps a device with a controllable clock and a throwaway
//! storage directory; `TestPair` wires two of them together with a cable.
//! Used by this crate's tests and, through the `test-helpers` feature, by
//! app crates built on top.

use std::rc::Rc;

use tempfile::TempDir;

use pdn_core::{SimClock, StateId};

use crate::context::DeviceContext;
use crate::device::{AppConfig, Device};
use crate::drivers::{AnimationKind, Button, ButtonInteraction};
use crate::transport::CableLink;

/// Default simulated tick length
pub const TICK_MS: u64 = 10;

pub struct TestDevice {
    pub device: Device,
    pub clock: SimClock,
    _dir: TempDir,
}

impl TestDevice {
    pub fn new(device_id: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp storage dir");
        let clock = SimClock::default();
        let mut ctx = DeviceContext::new(device_id, dir.path().join("flash"), Rc::new(clock.clone()))
            .expect("create device context");
        ctx.seed_rng(0x5EED);
        Self {
            device: Device::new(ctx),
            clock,
            _dir: dir,
        }
    }

    pub fn with_apps(device_id: &str, config: AppConfig) -> Self {
        let mut this = Self::new(device_id);
        this.device.load_app_config(config);
        this
    }

    pub fn activate(&mut self, app: StateId) {
        self.device.set_active_app(app);
    }

    // ── Time ────────────────────────────────────────────────────────────

    /// One device tick with no time passing
    pub fn tick(&mut self) {
        self.device.tick();
    }

    /// Advance the clock, then tick once
    pub fn step(&mut self, ms: u64) {
        self.clock.advance(ms);
        self.device.tick();
    }

    /// Run the device loop for `ms` simulated milliseconds
    pub fn run_for(&mut self, ms: u64) {
        let mut elapsed = 0;
        while elapsed < ms {
            let slice = TICK_MS.min(ms - elapsed);
            self.step(slice);
            elapsed += slice;
        }
    }

    // ── Input ───────────────────────────────────────────────────────────

    pub fn press_primary(&mut self) {
        self.device
            .ctx
            .buttons
            .inject(Button::Primary, ButtonInteraction::Click);
    }

    pub fn press_secondary(&mut self) {
        self.device
            .ctx
            .buttons
            .inject(Button::Secondary, ButtonInteraction::Click);
    }

    pub fn long_press_primary(&mut self) {
        self.device
            .ctx
            .buttons
            .inject(Button::Primary, ButtonInteraction::LongPress);
    }

    // ── Observation ─────────────────────────────────────────────────────

    pub fn screen_text(&self) -> String {
        self.device.ctx.display.screen_text()
    }

    pub fn screen_contains(&self, needle: &str) -> bool {
        self.screen_text().contains(needle)
    }

    pub fn animation(&self) -> Option<AnimationKind> {
        self.device.ctx.lights.active().map(|config| config.kind)
    }

    pub fn active_app(&self) -> Option<StateId> {
        self.device.active_app()
    }

    pub fn active_state(&self) -> Option<StateId> {
        self.device.active_state_id()
    }

    pub fn sever_link(&self) {
        self.device.ctx.link.sever();
    }
}

/// Two devices joined by a cable, clocks advanced in lockstep
pub struct TestPair {
    pub left: TestDevice,
    pub right: TestDevice,
}

impl TestPair {
    /// Plug a cable between two devices
    pub fn connect(mut left: TestDevice, mut right: TestDevice) -> Self {
        let (a, b) = CableLink::pair();
        left.device.ctx.link = a;
        right.device.ctx.link = b;
        Self { left, right }
    }

    pub fn tick_both(&mut self) {
        self.left.tick();
        self.right.tick();
    }

    /// Advance both clocks together, then tick left and right
    pub fn step_both(&mut self, ms: u64) {
        self.left.clock.advance(ms);
        self.right.clock.advance(ms);
        self.left.tick();
        self.right.tick();
    }

    pub fn run_for(&mut self, ms: u64) {
        let mut elapsed = 0;
        while elapsed < ms {
            let slice = TICK_MS.min(ms - elapsed);
            self.step_both(slice);
            elapsed += slice;
        }
    }

    pub fn sever(&self) {
        self.left.device.ctx.link.sever();
    }
}

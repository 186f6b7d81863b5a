//! Shared device context handed to every state callback
//!
//! The context owns the drivers, the cable link, the clock, and the small
//! mailboxes apps use to talk to each other across a switch. States never
//! hold driver references of their own; everything flows through `&mut
//! DeviceContext` for the duration of one callback.

use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use pdn_core::prelude::*;
use pdn_core::{Clock, StateId};

use crate::drivers::{ButtonDriver, DisplayDriver, HapticDriver, LightManager, StorageDriver};
use crate::transport::CableLink;

/// App switch requested by a state, applied by the device at end of tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    SwitchTo(StateId),
    ReturnToPrevious,
}

/// Parameters for a minigame about to be entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchRequest {
    pub hard_mode: bool,
    /// Managed games return to the launching app when finished instead of
    /// looping back to their own intro screen
    pub managed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Won,
    Lost,
}

/// Result a minigame posts for the launching app to collect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiniGameOutcome {
    pub result: GameResult,
    pub score: u32,
    pub hard_mode: bool,
}

pub struct DeviceContext {
    pub device_id: String,
    pub display: DisplayDriver,
    pub lights: LightManager,
    pub haptics: HapticDriver,
    pub buttons: ButtonDriver,
    pub storage: StorageDriver,
    pub link: CableLink,
    clock: Rc<dyn Clock>,
    rng: StdRng,
    commands: VecDeque<AppCommand>,
    launch_request: Option<LaunchRequest>,
    outcome: Option<MiniGameOutcome>,
}

impl DeviceContext {
    pub fn new(
        device_id: impl Into<String>,
        storage_root: impl AsRef<Path>,
        clock: Rc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            device_id: device_id.into(),
            display: DisplayDriver::new(),
            lights: LightManager::new(),
            haptics: HapticDriver::new(),
            buttons: ButtonDriver::new(),
            storage: StorageDriver::new(storage_root.as_ref())?,
            link: CableLink::default(),
            clock,
            rng: StdRng::from_entropy(),
            commands: VecDeque::new(),
            launch_request: None,
            outcome: None,
        })
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Make randomness reproducible, used by the test harness
    pub fn seed_rng(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    // ── App switch queue ────────────────────────────────────────────────

    /// Ask the device to activate another app once the current tick ends
    pub fn request_app_switch(&mut self, app: StateId) {
        self.commands.push_back(AppCommand::SwitchTo(app));
    }

    /// Ask the device to reactivate whichever app was active before this one
    pub fn request_return(&mut self) {
        self.commands.push_back(AppCommand::ReturnToPrevious);
    }

    /// Pop the command to apply this tick. At most one switch happens per
    /// tick; anything queued behind it is dropped with a warning.
    pub fn take_app_command(&mut self) -> Option<AppCommand> {
        let command = self.commands.pop_front()?;
        if !self.commands.is_empty() {
            warn!(
                dropped = self.commands.len(),
                "multiple app switches queued in one tick, applying first only"
            );
            self.commands.clear();
        }
        Some(command)
    }

    pub fn has_pending_command(&self) -> bool {
        !self.commands.is_empty()
    }

    // ── Cross-app mailboxes ─────────────────────────────────────────────

    pub fn set_launch_request(&mut self, request: LaunchRequest) {
        self.launch_request = Some(request);
    }

    pub fn take_launch_request(&mut self) -> Option<LaunchRequest> {
        self.launch_request.take()
    }

    pub fn post_outcome(&mut self, outcome: MiniGameOutcome) {
        if self.outcome.is_some() {
            warn!("overwriting uncollected minigame outcome");
        }
        self.outcome = Some(outcome);
    }

    pub fn take_outcome(&mut self) -> Option<MiniGameOutcome> {
        self.outcome.take()
    }
}

//! Device runtime: app table, active-app switching, tick loop
//!
//! Exactly one app (state machine) runs at a time. Switching pauses the
//! outgoing app before the incoming one mounts or resumes, and switches
//! requested by states are deferred to the end of the tick so a state never
//! yanks its own machine out from under a running callback.

use std::collections::HashMap;

use pdn_core::prelude::*;
use pdn_core::{StateId, StateMachine};

use crate::context::{AppCommand, DeviceContext};

/// Everything the device needs to boot: the set of installed apps
#[derive(Default)]
pub struct AppConfig {
    machines: Vec<StateMachine<DeviceContext>>,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, machine: StateMachine<DeviceContext>) {
        self.machines.push(machine);
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }
}

pub struct Device {
    pub ctx: DeviceContext,
    apps: HashMap<StateId, StateMachine<DeviceContext>>,
    active: Option<StateId>,
    previous: Option<StateId>,
}

impl Device {
    pub fn new(ctx: DeviceContext) -> Self {
        Self {
            ctx,
            apps: HashMap::new(),
            active: None,
            previous: None,
        }
    }

    /// Install the app table. Must happen before any app is activated.
    pub fn load_app_config(&mut self, config: AppConfig) {
        if self.active.is_some() {
            error!("load_app_config while an app is active, ignoring");
            return;
        }
        self.apps.clear();
        for machine in config.machines {
            let id = machine.id();
            if self.apps.insert(id, machine).is_some() {
                warn!(app = %id, "duplicate app id in config, keeping the later one");
            }
        }
        info!(apps = self.apps.len(), "app config loaded");
    }

    pub fn active_app(&self) -> Option<StateId> {
        self.active
    }

    pub fn previous_app(&self) -> Option<StateId> {
        self.previous
    }

    /// Current state of the active app, for diagnostics and tests
    pub fn active_state_id(&self) -> Option<StateId> {
        let id = self.active?;
        self.apps.get(&id)?.current_state_id()
    }

    pub fn has_app(&self, id: StateId) -> bool {
        self.apps.contains_key(&id)
    }

    /// Activate an app by id
    ///
    /// An unknown id is a logged no-op and the current app keeps running;
    /// a cable yanked mid-handshake can ask for apps this device never
    /// installed, and that must never take the UI down. Switching to the
    /// already-active app is also a no-op.
    pub fn set_active_app(&mut self, id: StateId) {
        if self.active == Some(id) {
            debug!(app = %id, "already active, ignoring switch");
            return;
        }
        match self.apps.get(&id) {
            None => {
                error!(app = %id, "unknown app id, staying on current app");
                return;
            }
            Some(machine) if machine.is_empty() => {
                error!(app = %id, "app has an empty state map, staying on current app");
                return;
            }
            Some(_) => {}
        }

        // outgoing app suspends before the incoming one touches any driver
        if let Some(current) = self.active {
            if let Some(machine) = self.apps.get_mut(&current) {
                machine.pause(&mut self.ctx);
            }
            self.previous = Some(current);
        }

        if let Some(machine) = self.apps.get_mut(&id) {
            if machine.current_index().is_some() && machine.is_paused() {
                debug!(app = %id, "resuming suspended app");
                machine.resume(&mut self.ctx);
            } else {
                debug!(app = %id, "mounting app");
                machine.mount(&mut self.ctx);
            }
        }
        self.active = Some(id);
    }

    /// Reactivate whichever app was active before the current one
    pub fn return_to_previous_app(&mut self) {
        match self.previous {
            Some(id) => self.set_active_app(id),
            None => warn!("no previous app to return to"),
        }
    }

    /// One frame: tick the active app, then apply at most one app switch
    /// requested during the tick. Paused apps get no cycles at all.
    pub fn tick(&mut self) {
        if let Some(id) = self.active {
            if let Some(machine) = self.apps.get_mut(&id) {
                machine.tick(&mut self.ctx);
            }
        }
        if let Some(command) = self.ctx.take_app_command() {
            match command {
                AppCommand::SwitchTo(app) => self.set_active_app(app),
                AppCommand::ReturnToPrevious => self.return_to_previous_app(),
            }
        }
    }

    /// Tear down all apps, then quiesce the hardware. Apps go first so their
    /// dismount hooks still have working drivers.
    pub fn shutdown(&mut self) {
        info!("device shutting down");
        for machine in self.apps.values_mut() {
            machine.shutdown(&mut self.ctx);
        }
        self.active = None;
        self.previous = None;
        self.ctx.haptics.off();
        self.ctx.lights.clear();
        self.ctx.display.clear();
        self.ctx.display.render();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdn_core::{SimClock, Snapshot, State, StateTransition};
    use serde::{Deserialize, Serialize};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::tempdir;

    type Journal = Rc<RefCell<Vec<String>>>;

    struct Beacon {
        id: StateId,
        journal: Journal,
        terminal: bool,
        switch_to: Option<StateId>,
        loops: u32,
    }

    impl Beacon {
        fn new(id: u16, journal: &Journal) -> Self {
            Self {
                id: StateId(id),
                journal: journal.clone(),
                terminal: false,
                switch_to: None,
                loops: 0,
            }
        }

        fn log(&self, event: &str) {
            self.journal.borrow_mut().push(format!("{event}:{}", self.id));
        }
    }

    #[derive(Serialize, Deserialize)]
    struct BeaconSnapshot {
        loops: u32,
    }

    impl State<DeviceContext> for Beacon {
        fn id(&self) -> StateId {
            self.id
        }

        fn on_mounted(&mut self, _ctx: &mut DeviceContext) {
            self.log("mount");
        }

        fn on_loop(&mut self, ctx: &mut DeviceContext) {
            self.loops += 1;
            self.log("loop");
            if let Some(target) = self.switch_to.take() {
                ctx.request_app_switch(target);
            }
        }

        fn on_dismounted(&mut self, _ctx: &mut DeviceContext) {
            self.log("dismount");
        }

        fn on_paused(&mut self, _ctx: &mut DeviceContext) -> Option<Snapshot> {
            self.log("pause");
            Snapshot::capture(self.id, &BeaconSnapshot { loops: self.loops })
        }

        fn on_resumed(&mut self, _ctx: &mut DeviceContext, snapshot: Option<Snapshot>) {
            self.log("resume");
            if let Some(saved) = snapshot.and_then(|s| s.restore::<BeaconSnapshot>(self.id)) {
                self.loops = saved.loops;
            }
        }

        fn is_terminal(&self) -> bool {
            self.terminal
        }

        fn transitions(&self) -> &[StateTransition] {
            &[]
        }
    }

    fn empty_device() -> (Device, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let ctx = DeviceContext::new("test", dir.path().join("store"), Rc::new(SimClock::default()))
            .unwrap();
        (Device::new(ctx), dir)
    }

    fn build_device(app_ids: &[u16]) -> (Device, Journal, tempfile::TempDir) {
        let (mut device, dir) = empty_device();
        let journal = Journal::default();

        let mut config = AppConfig::new();
        for &app_id in app_ids {
            let mut machine = StateMachine::new(StateId(app_id));
            machine.push_state(Box::new(Beacon::new(app_id * 10, &journal)));
            config.register(machine);
        }
        device.load_app_config(config);
        (device, journal, dir)
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.borrow().clone()
    }

    #[test]
    fn test_unknown_app_id_keeps_current_running() {
        let (mut device, journal, _dir) = build_device(&[1]);
        device.set_active_app(StateId(1));
        device.set_active_app(StateId(999));

        assert_eq!(device.active_app(), Some(StateId(1)));
        device.tick();
        assert_eq!(entries(&journal), vec!["mount:10", "loop:10"]);
    }

    #[test]
    fn test_same_app_switch_is_noop() {
        let (mut device, journal, _dir) = build_device(&[1]);
        device.set_active_app(StateId(1));
        device.set_active_app(StateId(1));

        // no pause, no remount
        assert_eq!(entries(&journal), vec!["mount:10"]);
    }

    #[test]
    fn test_switch_pauses_before_mounting() {
        let (mut device, journal, _dir) = build_device(&[1, 2]);
        device.set_active_app(StateId(1));
        device.set_active_app(StateId(2));

        assert_eq!(entries(&journal), vec!["mount:10", "pause:10", "mount:20"]);
        assert_eq!(device.previous_app(), Some(StateId(1)));
    }

    #[test]
    fn test_return_resumes_suspended_app() {
        let (mut device, journal, _dir) = build_device(&[1, 2]);
        device.set_active_app(StateId(1));
        device.tick();
        device.tick();
        device.set_active_app(StateId(2));
        device.return_to_previous_app();

        assert_eq!(device.active_app(), Some(StateId(1)));
        assert_eq!(
            entries(&journal),
            vec![
                "mount:10", "loop:10", "loop:10", "pause:10", "mount:20", "pause:20", "resume:10"
            ]
        );
    }

    #[test]
    fn test_paused_app_gets_no_cycles() {
        let (mut device, journal, _dir) = build_device(&[1, 2]);
        device.set_active_app(StateId(1));
        device.set_active_app(StateId(2));
        device.tick();
        device.tick();

        let loops_for_one = entries(&journal)
            .iter()
            .filter(|e| *e == "loop:10")
            .count();
        assert_eq!(loops_for_one, 0);
    }

    #[test]
    fn test_state_requested_switch_applies_at_end_of_tick() {
        let (mut device, _dir) = empty_device();
        let journal = Journal::default();

        let mut config = AppConfig::new();
        let mut app_one = StateMachine::new(StateId(1));
        let mut restless = Beacon::new(10, &journal);
        restless.switch_to = Some(StateId(2));
        app_one.push_state(Box::new(restless));
        config.register(app_one);

        let mut app_two = StateMachine::new(StateId(2));
        app_two.push_state(Box::new(Beacon::new(20, &journal)));
        config.register(app_two);

        device.load_app_config(config);
        device.set_active_app(StateId(1));
        device.tick();

        assert_eq!(device.active_app(), Some(StateId(2)));
        assert_eq!(
            entries(&journal),
            vec!["mount:10", "loop:10", "pause:10", "mount:20"]
        );
    }

    #[test]
    fn test_terminal_app_remounts_fresh_on_next_activation() {
        let (mut device, _dir) = empty_device();
        let journal = Journal::default();

        let mut config = AppConfig::new();
        let mut finished = StateMachine::new(StateId(1));
        let mut end = Beacon::new(10, &journal);
        end.terminal = true;
        finished.push_state(Box::new(end));
        config.register(finished);

        let mut other = StateMachine::new(StateId(2));
        other.push_state(Box::new(Beacon::new(20, &journal)));
        config.register(other);

        device.load_app_config(config);
        device.set_active_app(StateId(1));
        device.set_active_app(StateId(2));
        device.set_active_app(StateId(1));

        // terminal state completed on switch-away, so no pause/resume pair
        assert_eq!(
            entries(&journal),
            vec!["mount:10", "dismount:10", "mount:20", "pause:20", "mount:10"]
        );
    }

    #[test]
    fn test_tick_without_apps_is_harmless() {
        let (mut device, _dir) = empty_device();
        device.tick();
        device.tick();
        assert_eq!(device.active_app(), None);
    }

    #[test]
    fn test_load_config_while_active_is_rejected() {
        let (mut device, _journal, _dir) = build_device(&[1]);
        device.set_active_app(StateId(1));

        let mut replacement = AppConfig::new();
        replacement.register(StateMachine::new(StateId(7)));
        device.load_app_config(replacement);

        assert!(device.has_app(StateId(1)));
        assert!(!device.has_app(StateId(7)));
    }

    #[test]
    fn test_shutdown_dismounts_active_and_quiesces_drivers() {
        let (mut device, journal, _dir) = build_device(&[1, 2]);
        device.set_active_app(StateId(1));
        device.ctx.haptics.set_intensity(200);
        device.shutdown();

        assert_eq!(device.active_app(), None);
        assert!(entries(&journal).contains(&"dismount:10".to_string()));
        assert_eq!(device.ctx.haptics.intensity(), 0);
        assert!(!device.ctx.lights.is_animating());
    }
}

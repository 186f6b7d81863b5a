//! The state machine: an app's state map and tick loop
//!
//! A machine owns its states in a stable index order (the order they were
//! pushed during construction), tracks the single current state, and
//! evaluates transitions once per tick. Apps registered in the device app
//! table are machines; the device drives exactly one of them per tick.

use tracing::{debug, error, warn};

use crate::ids::StateId;
use crate::state::{Snapshot, State};

/// Owns a state map and drives one current state per tick
///
/// The state map is immutable once the machine has launched: states are
/// pushed during app construction and never after. Exactly one state is
/// current whenever the machine is active; at most one transition commits
/// per tick (no chaining), so every tick's side effects are attributable
/// to exactly one state entry.
pub struct StateMachine<C> {
    id: StateId,
    states: Vec<Box<dyn State<C>>>,
    current: Option<usize>,
    launched: bool,
    paused: bool,
    snapshot: Option<Snapshot>,
}

impl<C> StateMachine<C> {
    pub fn new(id: StateId) -> Self {
        Self {
            id,
            states: Vec::new(),
            current: None,
            launched: false,
            paused: false,
            snapshot: None,
        }
    }

    /// Add a state during construction; index order is significant and
    /// referenced later by `skip_to_state` and transition targets.
    pub fn push_state(&mut self, state: Box<dyn State<C>>) {
        if self.launched {
            error!(app = %self.id, "state map is immutable after launch, push ignored");
            return;
        }
        self.states.push(state);
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn has_launched(&self) -> bool {
        self.launched
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_state_id(&self) -> Option<StateId> {
        self.current.map(|idx| self.states[idx].id())
    }

    /// Enter the machine at state 0
    ///
    /// Called on first activation and again after a terminal state
    /// completed the app (the machine mounts fresh each time).
    pub fn mount(&mut self, ctx: &mut C) {
        if self.states.is_empty() {
            error!(app = %self.id, "cannot mount an empty state map");
            return;
        }
        if self.current.is_some() {
            warn!(app = %self.id, "mount while already active, ignoring");
            return;
        }
        self.launched = true;
        self.paused = false;
        self.current = Some(0);
        self.states[0].on_mounted(ctx);
    }

    /// One tick: current state's loop, then dynamic routing, then the
    /// static transition list (first satisfied guard wins).
    pub fn tick(&mut self, ctx: &mut C) {
        let Some(idx) = self.current else {
            warn!(app = %self.id, "tick with no current state");
            return;
        };
        if self.paused {
            warn!(app = %self.id, "tick while paused, ignoring");
            return;
        }

        self.states[idx].on_loop(ctx);

        if let Some(target) = self.states[idx].dynamic_target(ctx) {
            self.skip_to_state(ctx, target);
            return;
        }

        let target = self.states[idx]
            .transitions()
            .iter()
            .find(|transition| transition.is_satisfied())
            .map(|transition| transition.target());

        if let Some(target) = target {
            self.switch(ctx, idx, target);
        }
    }

    /// Forced jump bypassing transition guards; dismount/mount hooks still
    /// run symmetrically. Out-of-range targets are logged no-ops.
    pub fn skip_to_state(&mut self, ctx: &mut C, index: usize) {
        if index >= self.states.len() {
            error!(
                app = %self.id,
                index,
                len = self.states.len(),
                "skip_to_state target out of range"
            );
            return;
        }
        match self.current {
            Some(current) => self.switch(ctx, current, index),
            None => {
                error!(app = %self.id, "skip_to_state on an inactive machine");
            }
        }
    }

    fn switch(&mut self, ctx: &mut C, from: usize, to: usize) {
        if to >= self.states.len() {
            error!(
                app = %self.id,
                from = %self.states[from].id(),
                to,
                "transition target out of range, staying put"
            );
            return;
        }
        self.states[from].on_dismounted(ctx);
        self.current = Some(to);
        self.states[to].on_mounted(ctx);
    }

    /// Suspend for another app
    ///
    /// A machine parked on a terminal state treats the pause as completion:
    /// the state is dismounted and the machine resets so its next
    /// activation mounts fresh at state 0. Otherwise the current state's
    /// snapshot is stored for `resume`.
    pub fn pause(&mut self, ctx: &mut C) {
        let Some(idx) = self.current else {
            debug!(app = %self.id, "pause with no current state");
            return;
        };
        if self.paused {
            warn!(app = %self.id, "pause while already paused");
            return;
        }

        if self.states[idx].is_terminal() {
            self.states[idx].on_dismounted(ctx);
            self.current = None;
            self.snapshot = None;
            debug!(app = %self.id, "terminal state completed the app");
        } else {
            self.snapshot = self.states[idx].on_paused(ctx);
            self.paused = true;
        }
    }

    /// Continue where `pause` left off, handing back the stored snapshot
    pub fn resume(&mut self, ctx: &mut C) {
        let Some(idx) = self.current else {
            warn!(app = %self.id, "resume with no current state");
            return;
        };
        if !self.paused {
            warn!(app = %self.id, "resume while not paused");
            return;
        }
        self.paused = false;
        let snapshot = self.snapshot.take();
        self.states[idx].on_resumed(ctx, snapshot);
    }

    /// Force dismount of the current state; part of device teardown
    pub fn shutdown(&mut self, ctx: &mut C) {
        if let Some(idx) = self.current.take() {
            self.states[idx].on_dismounted(ctx);
        }
        self.paused = false;
        self.snapshot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Flag, StateTransition};
    use serde::{Deserialize, Serialize};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct TestCtx;

    type Journal = Rc<RefCell<Vec<String>>>;

    /// Configurable probe state recording its lifecycle into a shared journal
    struct Probe {
        id: StateId,
        journal: Journal,
        transitions: Vec<StateTransition>,
        terminal: bool,
        dynamic: Rc<RefCell<Option<usize>>>,
        counter: i32,
        resumed_counter: Rc<RefCell<Option<i32>>>,
    }

    impl Probe {
        fn new(id: u16, journal: &Journal) -> Self {
            Self {
                id: StateId(id),
                journal: journal.clone(),
                transitions: Vec::new(),
                terminal: false,
                dynamic: Rc::new(RefCell::new(None)),
                counter: 0,
                resumed_counter: Rc::new(RefCell::new(None)),
            }
        }

        fn log(&self, event: &str) {
            self.journal.borrow_mut().push(format!("{event}:{}", self.id));
        }
    }

    #[derive(Serialize, Deserialize)]
    struct ProbeSnapshot {
        x: i32,
    }

    impl State<TestCtx> for Probe {
        fn id(&self) -> StateId {
            self.id
        }

        fn on_mounted(&mut self, _ctx: &mut TestCtx) {
            self.log("mount");
        }

        fn on_loop(&mut self, _ctx: &mut TestCtx) {
            self.log("loop");
        }

        fn on_dismounted(&mut self, _ctx: &mut TestCtx) {
            self.log("dismount");
        }

        fn on_paused(&mut self, _ctx: &mut TestCtx) -> Option<Snapshot> {
            self.log("pause");
            Snapshot::capture(self.id, &ProbeSnapshot { x: self.counter })
        }

        fn on_resumed(&mut self, _ctx: &mut TestCtx, snapshot: Option<Snapshot>) {
            self.log("resume");
            if let Some(saved) = snapshot.and_then(|s| s.restore::<ProbeSnapshot>(self.id)) {
                *self.resumed_counter.borrow_mut() = Some(saved.x);
            }
        }

        fn is_terminal(&self) -> bool {
            self.terminal
        }

        fn dynamic_target(&mut self, _ctx: &mut TestCtx) -> Option<usize> {
            self.dynamic.borrow_mut().take()
        }

        fn transitions(&self) -> &[StateTransition] {
            &self.transitions
        }
    }

    fn journal() -> Journal {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.borrow().clone()
    }

    #[test]
    fn test_mount_enters_state_zero() {
        let j = journal();
        let mut machine = StateMachine::new(StateId(1));
        machine.push_state(Box::new(Probe::new(10, &j)));
        machine.push_state(Box::new(Probe::new(11, &j)));

        let mut ctx = TestCtx;
        machine.mount(&mut ctx);

        assert_eq!(machine.current_state_id(), Some(StateId(10)));
        assert_eq!(entries(&j), vec!["mount:10"]);
    }

    #[test]
    fn test_first_true_transition_wins() {
        let j = journal();
        let mut machine = StateMachine::new(StateId(1));

        let mut start = Probe::new(10, &j);
        let p2 = Flag::new();
        let p3 = Flag::new();
        start.transitions = vec![
            StateTransition::new(1, || false),
            StateTransition::when(&p2, 2),
            StateTransition::when(&p3, 3),
        ];
        machine.push_state(Box::new(start));
        machine.push_state(Box::new(Probe::new(11, &j)));
        machine.push_state(Box::new(Probe::new(12, &j)));
        machine.push_state(Box::new(Probe::new(13, &j)));

        let mut ctx = TestCtx;
        machine.mount(&mut ctx);
        p2.raise();
        p3.raise();
        machine.tick(&mut ctx);

        // P2's target (index 2), never P3's, and hooks ran symmetrically
        assert_eq!(machine.current_state_id(), Some(StateId(12)));
        assert_eq!(
            entries(&j),
            vec!["mount:10", "loop:10", "dismount:10", "mount:12"]
        );
    }

    #[test]
    fn test_one_switch_per_tick() {
        let j = journal();
        let mut machine = StateMachine::new(StateId(1));

        let mut a = Probe::new(10, &j);
        a.transitions = vec![StateTransition::new(1, || true)];
        let mut b = Probe::new(11, &j);
        b.transitions = vec![StateTransition::new(2, || true)];
        machine.push_state(Box::new(a));
        machine.push_state(Box::new(b));
        machine.push_state(Box::new(Probe::new(12, &j)));

        let mut ctx = TestCtx;
        machine.mount(&mut ctx);

        machine.tick(&mut ctx);
        assert_eq!(machine.current_state_id(), Some(StateId(11)));

        machine.tick(&mut ctx);
        assert_eq!(machine.current_state_id(), Some(StateId(12)));
    }

    #[test]
    fn test_skip_to_state_symmetric_hooks() {
        let j = journal();
        let mut machine = StateMachine::new(StateId(1));
        machine.push_state(Box::new(Probe::new(10, &j)));
        machine.push_state(Box::new(Probe::new(11, &j)));
        machine.push_state(Box::new(Probe::new(12, &j)));

        let mut ctx = TestCtx;
        machine.mount(&mut ctx);
        machine.skip_to_state(&mut ctx, 2);

        assert_eq!(machine.current_state_id(), Some(StateId(12)));
        assert_eq!(entries(&j), vec!["mount:10", "dismount:10", "mount:12"]);
    }

    #[test]
    fn test_skip_to_state_out_of_range_is_noop() {
        let j = journal();
        let mut machine = StateMachine::new(StateId(1));
        machine.push_state(Box::new(Probe::new(10, &j)));

        let mut ctx = TestCtx;
        machine.mount(&mut ctx);
        machine.skip_to_state(&mut ctx, 9);

        assert_eq!(machine.current_state_id(), Some(StateId(10)));
        assert_eq!(entries(&j), vec!["mount:10"]);
    }

    #[test]
    fn test_dynamic_target_bypasses_static_transitions() {
        let j = journal();
        let mut machine = StateMachine::new(StateId(1));

        let mut router = Probe::new(10, &j);
        router.transitions = vec![StateTransition::new(1, || true)];
        let dynamic = router.dynamic.clone();
        machine.push_state(Box::new(router));
        machine.push_state(Box::new(Probe::new(11, &j)));
        machine.push_state(Box::new(Probe::new(12, &j)));

        let mut ctx = TestCtx;
        machine.mount(&mut ctx);
        *dynamic.borrow_mut() = Some(2);
        machine.tick(&mut ctx);

        // the dynamic target wins over the always-true static transition
        assert_eq!(machine.current_state_id(), Some(StateId(12)));
    }

    #[test]
    fn test_pause_resume_snapshot_round_trip() {
        let j = journal();
        let mut machine = StateMachine::new(StateId(1));

        let mut state = Probe::new(10, &j);
        state.counter = 5;
        let resumed = state.resumed_counter.clone();
        machine.push_state(Box::new(state));

        let mut ctx = TestCtx;
        machine.mount(&mut ctx);
        machine.pause(&mut ctx);
        assert!(machine.is_paused());

        machine.resume(&mut ctx);
        assert!(!machine.is_paused());
        assert_eq!(*resumed.borrow(), Some(5));
    }

    #[test]
    fn test_terminal_state_pause_completes_app() {
        let j = journal();
        let mut machine = StateMachine::new(StateId(1));

        let mut end = Probe::new(10, &j);
        end.terminal = true;
        machine.push_state(Box::new(end));

        let mut ctx = TestCtx;
        machine.mount(&mut ctx);
        machine.pause(&mut ctx);

        // completed, not suspended: next activation mounts fresh
        assert!(!machine.is_paused());
        assert_eq!(machine.current_index(), None);
        assert_eq!(entries(&j), vec!["mount:10", "dismount:10"]);

        machine.mount(&mut ctx);
        assert_eq!(entries(&j), vec!["mount:10", "dismount:10", "mount:10"]);
    }

    #[test]
    fn test_push_after_launch_ignored() {
        let j = journal();
        let mut machine = StateMachine::new(StateId(1));
        machine.push_state(Box::new(Probe::new(10, &j)));

        let mut ctx = TestCtx;
        machine.mount(&mut ctx);
        machine.push_state(Box::new(Probe::new(11, &j)));

        assert_eq!(machine.len(), 1);
    }

    #[test]
    fn test_mount_empty_machine_is_noop() {
        let mut machine: StateMachine<TestCtx> = StateMachine::new(StateId(1));
        let mut ctx = TestCtx;
        machine.mount(&mut ctx);
        assert!(!machine.has_launched());
        assert_eq!(machine.current_index(), None);
    }

    #[test]
    fn test_shutdown_dismounts_current_state() {
        let j = journal();
        let mut machine = StateMachine::new(StateId(1));
        machine.push_state(Box::new(Probe::new(10, &j)));

        let mut ctx = TestCtx;
        machine.mount(&mut ctx);
        machine.shutdown(&mut ctx);

        assert_eq!(machine.current_index(), None);
        assert_eq!(entries(&j), vec!["mount:10", "dismount:10"]);
    }
}

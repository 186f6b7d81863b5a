//! The state abstraction: lifecycle hooks, guarded transitions, snapshots
//!
//! A `State` is a polymorphic unit of behavior with an integer identity.
//! It owns an ordered list of outgoing transitions; each pairs a
//! zero-argument guard with the index of the target state in the owning
//! machine's state map. Guards are evaluated in registration order after
//! each tick and the first true guard wins.
//!
//! States raise `Flag`s from `on_loop` to fuel their guards, lower them in
//! `on_mounted`, and must undo in `on_dismounted` everything that
//! `on_mounted`/`on_loop` set up (timers, button claims, animations).

use crate::ids::StateId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::Cell;
use std::rc::Rc;

// ─────────────────────────────────────────────────────────────────
// Flag
// ─────────────────────────────────────────────────────────────────

/// Shared boolean cell connecting a state's loop to its transition guards
///
/// Cloned handles observe the same value; the state keeps one handle to
/// raise/lower and its transitions capture another to read.
#[derive(Clone, Default)]
pub struct Flag {
    raised: Rc<Cell<bool>>,
}

impl Flag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.set(true);
    }

    pub fn lower(&self) {
        self.raised.set(false);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.get()
    }
}

// ─────────────────────────────────────────────────────────────────
// StateTransition
// ─────────────────────────────────────────────────────────────────

/// A (guard, target) pair; target indexes the owning machine's state map
pub struct StateTransition {
    guard: Box<dyn Fn() -> bool>,
    target: usize,
}

impl StateTransition {
    pub fn new(target: usize, guard: impl Fn() -> bool + 'static) -> Self {
        Self {
            guard: Box::new(guard),
            target,
        }
    }

    /// Transition taken when `flag` is raised
    pub fn when(flag: &Flag, target: usize) -> Self {
        let flag = flag.clone();
        Self::new(target, move || flag.is_raised())
    }

    pub fn is_satisfied(&self) -> bool {
        (self.guard)()
    }

    pub fn target(&self) -> usize {
        self.target
    }
}

// ─────────────────────────────────────────────────────────────────
// Snapshot
// ─────────────────────────────────────────────────────────────────

/// Opaque per-state pause payload
///
/// A pausing state serializes a private struct into the payload; on resume
/// it checks the owning `state_id` and deserializes. A mismatched or
/// malformed snapshot is logged and ignored, never trusted.
#[derive(Debug, Clone)]
pub struct Snapshot {
    state_id: StateId,
    payload: serde_json::Value,
}

impl Snapshot {
    /// Capture `data` for the state `id`; serialization failure logs and
    /// drops the snapshot (the state resumes cold).
    pub fn capture<T: Serialize>(id: StateId, data: &T) -> Option<Self> {
        match serde_json::to_value(data) {
            Ok(payload) => Some(Self {
                state_id: id,
                payload,
            }),
            Err(err) => {
                tracing::error!(state = %id, "failed to capture snapshot: {err}");
                None
            }
        }
    }

    /// Recover the payload for state `id`; `None` if the snapshot belongs
    /// to a different state or does not decode.
    pub fn restore<T: DeserializeOwned>(&self, id: StateId) -> Option<T> {
        if self.state_id != id {
            tracing::warn!(
                expected = %id,
                found = %self.state_id,
                "snapshot belongs to a different state, ignoring"
            );
            return None;
        }
        match serde_json::from_value(self.payload.clone()) {
            Ok(data) => Some(data),
            Err(err) => {
                tracing::warn!(state = %id, "snapshot payload did not decode: {err}");
                None
            }
        }
    }

    pub fn state_id(&self) -> StateId {
        self.state_id
    }
}

// ─────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────

/// A unit of behavior owned by a `StateMachine`
///
/// Lifecycle contract: `on_mounted` is called exactly once per entry,
/// `on_loop` once per device tick while current, `on_dismounted` exactly
/// once per exit (including forced jumps). `on_paused`/`on_resumed` bracket
/// cross-app suspension; a state that never pauses never snapshots.
///
/// `C` is the tick context handed to every hook (drivers, clock, link,
/// app-switch requests).
pub trait State<C> {
    fn id(&self) -> StateId;

    fn on_mounted(&mut self, ctx: &mut C);

    fn on_loop(&mut self, ctx: &mut C);

    fn on_dismounted(&mut self, ctx: &mut C);

    /// Capture in-progress data before another app takes over
    fn on_paused(&mut self, _ctx: &mut C) -> Option<Snapshot> {
        None
    }

    /// Continue from a snapshot produced by `on_paused` (if any)
    fn on_resumed(&mut self, _ctx: &mut C, _snapshot: Option<Snapshot>) {}

    /// Terminal states end their app: pausing a machine parked on a
    /// terminal state completes it (dismount + reset) instead of
    /// suspending it.
    fn is_terminal(&self) -> bool {
        false
    }

    /// Runtime-computed routing: a `Some(index)` returned after `on_loop`
    /// forces a jump to that index, bypassing the static transition list.
    /// For states whose fan-out cannot be expressed as a fixed guard list.
    fn dynamic_target(&mut self, _ctx: &mut C) -> Option<usize> {
        None
    }

    /// Outgoing transitions in evaluation order (first true wins)
    fn transitions(&self) -> &[StateTransition] {
        &[]
    }
}

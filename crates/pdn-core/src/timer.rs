//! Monotonic clock injection and the cooperative countdown timer
//!
//! Timers are polled values, never scheduled callbacks: a state checks
//! `expired()` on its own tick and reacts there. The clock is injected
//! (shared handle) rather than read from a process-wide global, so tests
//! and the device harness can drive time deterministically.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic millisecond clock
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall clock measured from construction
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Manually advanced clock for tests and the simulator harness
///
/// Cloned handles share the same underlying time, so the harness keeps one
/// handle and the device context another.
#[derive(Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Cooperative countdown timer
///
/// A plain value: callers pass the current clock reading in. An invalidated
/// timer is not running and never reports expiry. A zero-duration timer
/// expires on the first check.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timer {
    deadline_ms: Option<u64>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer to expire `duration_ms` from `now_ms`
    pub fn start(&mut self, now_ms: u64, duration_ms: u64) {
        self.deadline_ms = Some(now_ms.saturating_add(duration_ms));
    }

    /// Disarm the timer
    pub fn invalidate(&mut self) {
        self.deadline_ms = None;
    }

    pub fn is_running(&self) -> bool {
        self.deadline_ms.is_some()
    }

    pub fn expired(&self, now_ms: u64) -> bool {
        matches!(self.deadline_ms, Some(deadline) if now_ms >= deadline)
    }

    /// Milliseconds until expiry (zero when expired or disarmed)
    pub fn remaining(&self, now_ms: u64) -> u64 {
        self.deadline_ms
            .map(|deadline| deadline.saturating_sub(now_ms))
            .unwrap_or(0)
    }
}

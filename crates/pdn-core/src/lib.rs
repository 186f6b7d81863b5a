//! # pdn-core - State Machine Runtime
//!
//! Foundation crate for the PDN firmware. Provides the hierarchical
//! state-machine runtime, identity types, the cooperative timer, error
//! handling, and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on
//! external crates (serde, chrono, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Identity (`ids`)
//! - [`StateId`] - Integer identity shared by apps and states (disjoint
//!   numeric ranges by convention)
//! - App id constants and the per-app state id bands
//!
//! ### Runtime (`state`, `machine`)
//! - [`State`] - Polymorphic unit of behavior with lifecycle hooks
//! - [`StateTransition`] - Guarded transition to a state-map index
//! - [`Flag`] - Shared boolean cell fueling transition guards
//! - [`Snapshot`] - Opaque per-state pause payload
//! - [`StateMachine`] - State map, tick loop, forced jumps, pause/resume
//!
//! ### Time (`timer`)
//! - [`Clock`] - Injectable monotonic millisecond clock
//! - [`SimClock`] / [`SystemClock`] - Simulated and wall-clock impls
//! - [`Timer`] - Polled countdown value
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Firmware error enum with `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use pdn_core::prelude::*;
//! ```

pub mod error;
pub mod ids;
pub mod logging;
pub mod machine;
pub mod state;
pub mod timer;

/// Prelude for common imports used throughout all PDN crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use error::{Error, Result, ResultExt};
pub use ids::{
    minigame_app_id, minigame_state_base, StateId, BREACH_DEFENSE_APP_ID, CIPHER_PATH_APP_ID,
    EXPLOIT_SEQUENCER_APP_ID, FIREWALL_DECRYPT_APP_ID, GHOST_RUNNER_APP_ID, KONAMI_APP_ID,
    KONAMI_STATE_BASE, MINIGAME_COUNT, QUICKDRAW_APP_ID, QUICKDRAW_STATE_BASE,
    REGISTRATION_APP_ID, REGISTRATION_STATE_BASE, SIGNAL_ECHO_APP_ID, SPIKE_VECTOR_APP_ID,
};
pub use machine::StateMachine;
pub use state::{Flag, Snapshot, State, StateTransition};
pub use timer::{Clock, SimClock, SystemClock, Timer};

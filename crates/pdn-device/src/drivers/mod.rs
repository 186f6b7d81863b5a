//! Hardware driver simulations
//!
//! Each driver mirrors the contract of the real peripheral closely enough for
//! app code to be written against it unchanged. All of them are synchronous
//! and deterministic so tests can drive the device tick by tick.

pub mod buttons;
pub mod display;
pub mod haptics;
pub mod lights;
pub mod storage;

pub use buttons::{Button, ButtonDriver, ButtonInteraction, ButtonPress};
pub use display::{DisplayDriver, DrawOp, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use haptics::HapticDriver;
pub use lights::{AnimationConfig, AnimationKind, EaseCurve, LightManager};
pub use storage::StorageDriver;

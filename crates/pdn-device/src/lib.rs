//! Simulated badge hardware and the app runtime that drives it
//!
//! Everything the real unit exposes to app code is modeled here: the
//! peripherals, the peer cable, and the device loop that multiplexes one
//! active app over them.
//!
//! ## Drivers
//!
//! [`drivers`] holds deterministic stand-ins for each peripheral: the
//! [`DisplayDriver`] records draw ops instead of rasterizing, the
//! [`ButtonDriver`] routes presses to whichever state holds the input claim,
//! [`LightManager`] and [`HapticDriver`] track the requested output, and
//! [`StorageDriver`] persists JSON documents to a directory.
//!
//! ## Transport
//!
//! [`transport`] is the peer protocol: a [`Message`] enum serialized as one
//! JSON object per line, and [`CableLink`], a point-to-point channel whose
//! two ends are created together by [`CableLink::pair`]. Receive is
//! garbage-tolerant; disconnects are observable from both ends.
//!
//! ## Runtime
//!
//! [`DeviceContext`] bundles the drivers, link, clock, and cross-app
//! mailboxes, and is the context type threaded through every state callback.
//! [`Device`] owns the app table and applies app switches at end of tick.
//!
//! ## Testing
//!
//! With the `test-helpers` feature, [`test_utils`] provides `TestDevice` and
//! `TestPair` for driving one or two simulated devices tick by tick.

pub mod context;
pub mod device;
pub mod drivers;
pub mod transport;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use context::{AppCommand, DeviceContext, GameResult, LaunchRequest, MiniGameOutcome};
pub use device::{AppConfig, Device};
pub use drivers::{
    AnimationConfig, AnimationKind, Button, ButtonDriver, ButtonInteraction, ButtonPress,
    DisplayDriver, DrawOp, EaseCurve, HapticDriver, LightManager, StorageDriver, SCREEN_HEIGHT,
    SCREEN_WIDTH,
};
pub use transport::{encode_message, parse_message, CableLink, Message};

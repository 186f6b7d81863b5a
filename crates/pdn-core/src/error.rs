//! Firmware error types with rich context

use crate::ids::StateId;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Firmware error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // State Machine Errors
    // ─────────────────────────────────────────────────────────────
    #[error("State machine error: {message}")]
    Machine { message: String },

    #[error("Unknown state id: {id}")]
    UnknownState { id: StateId },

    #[error("State index {index} out of range (map holds {len})")]
    StateIndexOutOfRange { index: usize, len: usize },

    // ─────────────────────────────────────────────────────────────
    // App Lifecycle Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Unknown app id: {id}")]
    UnknownApp { id: StateId },

    #[error("App lifecycle error: {message}")]
    Lifecycle { message: String },

    // ─────────────────────────────────────────────────────────────
    // Transport/Protocol Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Peer protocol error: {message}")]
    Protocol { message: String },

    #[error("Link disconnected")]
    LinkDown,

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Storage error: {message}")]
    Storage { message: String },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn machine(message: impl Into<String>) -> Self {
        Self::Machine {
            message: message.into(),
        }
    }

    pub fn lifecycle(message: impl Into<String>) -> Self {
        Self::Lifecycle {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn unknown_app(id: StateId) -> Self {
        Self::UnknownApp { id }
    }

    pub fn unknown_state(id: StateId) -> Self {
        Self::UnknownState { id }
    }

    /// Check if this is a recoverable error
    ///
    /// Recoverable errors degrade to a logged no-op: the device keeps
    /// running in its last good configuration.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UnknownApp { .. }
                | Error::UnknownState { .. }
                | Error::StateIndexOutOfRange { .. }
                | Error::Protocol { .. }
                | Error::Transport { .. }
                | Error::LinkDown
        )
    }

    /// Check if this error indicates a construction-time programmer error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Machine { .. } | Error::Lifecycle { .. })
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = Error::transport("cable unplugged");
        assert_eq!(err.to_string(), "Transport error: cable unplugged");

        let err = Error::unknown_app(StateId(999));
        assert_eq!(err.to_string(), "Unknown app id: 999");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_recoverable() {
        assert!(Error::unknown_app(StateId(999)).is_recoverable());
        assert!(Error::protocol("unexpected message").is_recoverable());
        assert!(Error::LinkDown.is_recoverable());
        assert!(!Error::machine("state map populated twice").is_recoverable());
    }

    #[test]
    fn test_error_is_fatal() {
        assert!(Error::machine("bad wiring").is_fatal());
        assert!(Error::lifecycle("shutdown after teardown").is_fatal());
        assert!(!Error::transport("dropped frame").is_fatal());
    }

    #[test]
    fn test_error_constructors() {
        let _ = Error::machine("test");
        let _ = Error::lifecycle("test");
        let _ = Error::transport("test");
        let _ = Error::protocol("test");
        let _ = Error::config("test");
        let _ = Error::storage("test");
    }

    #[test]
    fn test_index_out_of_range_error() {
        let err = Error::StateIndexOutOfRange { index: 40, len: 35 };
        assert!(err.to_string().contains("40"));
        assert!(err.to_string().contains("35"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_result_ext_context() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = res.context("saving progress").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}

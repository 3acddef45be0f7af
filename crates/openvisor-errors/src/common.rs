//! Common error types and utilities used across all OpenVisor crates.

use crate::{SessionError, TrackingError};

/// Top-level error type that can wrap all OpenVisor sub-errors.
#[derive(Debug, thiserror::Error)]
pub enum OpenVisorError {
    /// Per-frame tracking errors
    #[error("tracking error: {0}")]
    Tracking(#[from] TrackingError),

    /// Session lifecycle errors
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl OpenVisorError {
    /// Get the error severity level.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            OpenVisorError::Tracking(e) => e.severity(),
            OpenVisorError::Session(e) => e.severity(),
            OpenVisorError::Config(_) => ErrorSeverity::Error,
            OpenVisorError::Other(_) => ErrorSeverity::Error,
        }
    }

    /// Check if this error is recoverable without a session restart.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.severity() < ErrorSeverity::Critical
    }

    /// Create a configuration error with a message.
    pub fn config(msg: impl Into<String>) -> Self {
        OpenVisorError::Config(msg.into())
    }

    /// Create a generic error with a message.
    pub fn other(msg: impl Into<String>) -> Self {
        OpenVisorError::Other(msg.into())
    }
}

/// Error severity for escalation and logging decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ErrorSeverity {
    /// Informational; expected in normal operation.
    Info = 0,
    /// Degraded but self-correcting.
    Warning = 1,
    /// Operation failed; session continues.
    Error = 2,
    /// Session integrity is compromised.
    Critical = 3,
}

//! Session lifecycle errors.

use visor_schemas::SessionState;

/// Errors raised by the session lifecycle gate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// An illegal lifecycle transition was requested.
    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition {
        /// State the session was in.
        from: SessionState,
        /// State that was requested.
        to: SessionState,
    },

    /// The operation requires a running session.
    #[error("session is not running (state: {0})")]
    NotRunning(SessionState),

    /// The session has been destroyed and cannot be used again.
    #[error("session has been destroyed")]
    Destroyed,
}

impl SessionError {
    /// Get the error severity.
    #[must_use]
    pub const fn severity(&self) -> crate::ErrorSeverity {
        match self {
            SessionError::InvalidTransition { .. } => crate::ErrorSeverity::Error,
            SessionError::NotRunning(_) => crate::ErrorSeverity::Warning,
            SessionError::Destroyed => crate::ErrorSeverity::Critical,
        }
    }
}

//! Session lifecycle vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse session lifecycle state.
///
/// The session gates pose queries and frame-stats collection: both are only
/// meaningful while `Running`. `Destroyed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// The session has not been created yet.
    Uninitialized,
    /// The session is created but not yet started.
    Initialized,
    /// Tracking is active and pose queries are valid.
    Running,
    /// The session is alive but tracking updates are suspended.
    Paused,
    /// The session has been torn down. Terminal.
    Destroyed,
}

impl SessionState {
    /// Whether the session exists (created and not destroyed).
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !matches!(
            self,
            SessionState::Uninitialized | SessionState::Destroyed
        )
    }

    /// Whether pose queries and frame-stats collection are active.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, SessionState::Running)
    }

    /// Whether `self -> to` is a legal lifecycle transition.
    ///
    /// Legal transitions: Uninitialized -> Initialized -> Running <-> Paused,
    /// and any created state -> Destroyed. Self-transitions are not legal.
    #[must_use]
    pub const fn can_transition_to(self, to: SessionState) -> bool {
        matches!(
            (self, to),
            (SessionState::Uninitialized, SessionState::Initialized)
                | (SessionState::Initialized, SessionState::Running)
                | (SessionState::Running, SessionState::Paused)
                | (SessionState::Paused, SessionState::Running)
                | (SessionState::Initialized, SessionState::Destroyed)
                | (SessionState::Running, SessionState::Destroyed)
                | (SessionState::Paused, SessionState::Destroyed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Initialized => write!(f, "initialized"),
            SessionState::Running => write!(f, "running"),
            SessionState::Paused => write!(f, "paused"),
            SessionState::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Which stereo eye a render callback refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Eye {
    /// Left eye camera.
    Left,
    /// Right eye camera.
    Right,
}

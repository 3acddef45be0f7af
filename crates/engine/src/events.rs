//! Session event bus.
//!
//! Tracking state changes are announced on a broadcast channel owned by the
//! session, so subscription lifetimes are tied to the receivers instead of
//! process-wide statics. Emitting with no live subscribers is fine: the bus
//! keeps one receiver alive internally.

use tokio::sync::broadcast;

use visor_schemas::prelude::*;

/// Events announced by a tracking session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Tracking recovered: the head pose is valid again.
    PoseReady,
    /// Tracking was lost, with the backend's reason.
    LostTracking(LostTrackingReason),
    /// A tracking-mode change is about to be dispatched.
    ModeChanging {
        /// Mode in effect when the change was requested.
        from: TrackingMode,
        /// Mode being switched to.
        to: TrackingMode,
    },
    /// A tracking-mode change settled (success or failure).
    ModeChanged(TrackingModeChangedResult),
    /// The world origin was re-cached or reset.
    WorldPoseReset,
    /// The session lifecycle state changed.
    StateChanged {
        /// Previous lifecycle state.
        from: SessionState,
        /// New lifecycle state.
        to: SessionState,
    },
}

/// Broadcast bus for [`SessionEvent`]s.
#[derive(Debug)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
    _receiver: broadcast::Receiver<SessionEvent>,
}

impl SessionEvents {
    /// Create a bus with the given per-subscriber buffer capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            _receiver: receiver,
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: SessionEvent) {
        // The internal receiver keeps the channel open, so send cannot fail.
        let _ = self.sender.send(event);
    }

    /// Subscribe to session events.
    ///
    /// Slow subscribers that fall more than the buffer capacity behind see
    /// `RecvError::Lagged` and skip ahead; they never block the emitter.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

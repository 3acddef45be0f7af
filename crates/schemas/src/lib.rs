//! OpenVisor - Schema Definitions
//!
//! This crate contains the shared domain types for OpenVisor head-tracking
//! sessions: poses and timestamps, tracking modes and capabilities, and the
//! session lifecycle vocabulary. These types enforce the core invariants
//! (normalized orientations, valid state transitions) at the type level.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

pub mod pose;
pub mod session;
pub mod tracking;

/// Public prelude module for explicit imports
///
/// Consumers must use `visor_schemas::prelude::*` explicitly to import
/// commonly used types.
pub mod prelude {
    pub use crate::pose::{Pose, TimestampedPose};
    pub use crate::session::{Eye, SessionState};
    pub use crate::tracking::{
        Capability, LostTrackingReason, TrackingMode, TrackingModeChangedResult,
    };
}

pub use pose::{Pose, TimestampedPose};
pub use session::{Eye, SessionState};
pub use tracking::{Capability, LostTrackingReason, TrackingMode, TrackingModeChangedResult};

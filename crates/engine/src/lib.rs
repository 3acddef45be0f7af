//! OpenVisor Engine - Head-Tracking Session Core
//!
//! This crate contains the session core that sits between a perception
//! backend and a rendering host: the tracking-mode state machine, world-pose
//! calibration, per-frame pose cache, and frame-present timing metrics,
//! gated by a coarse session lifecycle. The backends are trait objects, so
//! the same core runs against native hardware or the virtual backend used
//! in tests.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

pub mod calibration;
pub mod events;
pub mod frame_timing;
pub mod pose;
pub mod ports;
pub mod prelude;
pub mod session;
pub mod tracker;
#[cfg(any(test, feature = "harness"))]
pub mod virtual_backend;

pub use calibration::WorldCalibration;
pub use events::{SessionEvent, SessionEvents};
pub use frame_timing::{
    FrameFinishHandle, FrameFinishQueue, FrameMetrics, FrameMetricsSnapshot, FrameStats,
    MetricsCollector, PollLimiter,
};
pub use pose::PoseCache;
pub use ports::{PresentMetricsSource, TrackingBackend};
pub use session::{Session, SessionConfig};
pub use tracker::{HeadTracker, OnModeChanged};

#[cfg(any(test, feature = "harness"))]
pub use virtual_backend::{ManualClock, VirtualPresentMetrics, VirtualTrackingBackend};

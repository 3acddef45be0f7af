//! Prelude module for common engine types
//!
//! This module provides a convenient way to import the most commonly used
//! types from the tracking engine.

pub use crate::calibration::WorldCalibration;
pub use crate::events::{SessionEvent, SessionEvents};
pub use crate::frame_timing::{FrameFinishHandle, FrameMetricsSnapshot, MetricsCollector};
pub use crate::pose::PoseCache;
pub use crate::ports::{PresentMetricsSource, TrackingBackend};
pub use crate::session::{Session, SessionConfig};
pub use crate::tracker::{HeadTracker, OnModeChanged};

// Schema vocabulary the engine API speaks
pub use visor_schemas::prelude::*;

// Virtual backend for development and tests
#[cfg(any(test, feature = "harness"))]
pub use crate::virtual_backend::{ManualClock, VirtualPresentMetrics, VirtualTrackingBackend};

//! Port traits for clean architecture boundaries
//!
//! This module defines the port interfaces that separate the tracking core
//! from the perception and presentation hardware. These traits define
//! contracts for external dependencies without coupling to a specific
//! native stack, and are the seam the virtual backend plugs into for tests.

use visor_schemas::prelude::*;

/// Tracking backend abstraction for the perception stack.
///
/// Implementations wrap whatever produces head poses (a native SLAM stack, a
/// simulator, a recording). All methods except [`switch_tracking_mode`] are
/// called on the frame loop every frame and must not block.
///
/// [`switch_tracking_mode`]: TrackingBackend::switch_tracking_mode
pub trait TrackingBackend: Send + Sync {
    /// Switch the active tracking mode.
    ///
    /// This call MAY block for a long time while the perception stack
    /// reconfigures; it must only be invoked off the frame loop (the head
    /// tracker dispatches it to a background worker). Returns whether the
    /// switch succeeded.
    fn switch_tracking_mode(&self, target: TrackingMode) -> bool;

    /// Whether the device supports a perception capability (frame-loop safe).
    fn is_capability_supported(&self, capability: Capability) -> bool;

    /// Head pose at a specific hardware timestamp (frame-loop safe).
    ///
    /// Returns `None` when the backend has no pose for that time.
    fn head_pose_at(&self, timestamp_ns: u64) -> Option<Pose>;

    /// Head pose predicted for the next frame present, with tracking health
    /// and the hardware timestamp it applies to (frame-loop safe).
    ///
    /// Returns `None` when no pose is available at all.
    fn frame_present_head_pose(&self) -> Option<TimestampedPose>;

    /// Current hardware clock in nanoseconds (frame-loop safe).
    ///
    /// Monotonically non-decreasing; this is the time base for every frame
    /// timestamp in the metrics pipeline.
    fn hmd_time_nanos(&self) -> u64;
}

/// Present-timing counters reported by the display pipeline.
///
/// Queried at low frequency (at most twice per second) to bound overhead;
/// the metrics collector enforces the throttle.
pub trait PresentMetricsSource: Send + Sync {
    /// How many times the current frame has been presented.
    fn frame_present_count(&self) -> u32;

    /// Frames shown more than once since the last query.
    fn extra_frame_count(&self) -> u32;

    /// Frames ready ahead of their display slot since the last query.
    fn early_frame_count(&self) -> u32;

    /// Frames that missed their display slot since the last query.
    fn dropped_frame_count(&self) -> u32;

    /// Application frame latency in nanoseconds.
    fn frame_latency_ns(&self) -> u64;

    /// Presentation rate in frames per second.
    fn present_fps(&self) -> u32;
}

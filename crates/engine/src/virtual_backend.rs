//! Virtual tracking backend for tests and development.
//!
//! Implements the backend ports over in-memory state with injection points
//! for everything the session core reacts to: capability support, scripted
//! poses, switch success/failure, blocking switches, and native present
//! counters. The hardware clock is a [`ManualClock`] the test advances by
//! hand, so timing behavior is fully deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use visor_schemas::prelude::*;

use crate::ports::{PresentMetricsSource, TrackingBackend};

/// Hand-driven hardware clock shared with the backend.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicU64>,
}

impl ManualClock {
    /// A clock starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time in nanoseconds.
    #[must_use]
    pub fn now_ns(&self) -> u64 {
        self.now_ns.load(Ordering::Relaxed)
    }

    /// Advance the clock.
    pub fn advance(&self, delta_ns: u64) {
        self.now_ns.fetch_add(delta_ns, Ordering::Relaxed);
    }

    /// Jump the clock to an absolute time.
    pub fn set(&self, now_ns: u64) {
        self.now_ns.store(now_ns, Ordering::Relaxed);
    }
}

#[derive(Debug)]
struct VirtualState {
    sample: TimestampedPose,
    pose_available: bool,
    position_supported: bool,
    rotation_supported: bool,
    switch_result: bool,
    switch_gate: Option<Receiver<bool>>,
    switch_history: Vec<TrackingMode>,
}

/// In-memory tracking backend with scriptable behavior.
#[derive(Debug)]
pub struct VirtualTrackingBackend {
    clock: ManualClock,
    state: Mutex<VirtualState>,
}

impl Default for VirtualTrackingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualTrackingBackend {
    /// A backend with full capabilities and instantly succeeding switches.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capabilities(true, true)
    }

    /// A backend with the given capability support.
    #[must_use]
    pub fn with_capabilities(position: bool, rotation: bool) -> Self {
        Self {
            clock: ManualClock::new(),
            state: Mutex::new(VirtualState {
                sample: TimestampedPose::tracked(Pose::IDENTITY, 0),
                pose_available: true,
                position_supported: position,
                rotation_supported: rotation,
                switch_result: true,
                switch_gate: None,
                switch_history: Vec::new(),
            }),
        }
    }

    /// The clock this backend reports hardware time from.
    #[must_use]
    pub fn clock(&self) -> ManualClock {
        self.clock.clone()
    }

    /// Script the pose the backend reports.
    pub fn set_pose(&self, pose: Pose, timestamp_ns: u64, lost_reason: LostTrackingReason) {
        let mut state = self.state.lock();
        state.sample = TimestampedPose {
            pose,
            timestamp_ns,
            lost_reason,
        };
    }

    /// Make pose fetches succeed or fail.
    pub fn set_pose_available(&self, available: bool) {
        self.state.lock().pose_available = available;
    }

    /// Make non-blocking switches succeed or fail.
    pub fn set_switch_result(&self, success: bool) {
        self.state.lock().switch_result = success;
    }

    /// Change the advertised capability support.
    pub fn set_capabilities(&self, position: bool, rotation: bool) {
        let mut state = self.state.lock();
        state.position_supported = position;
        state.rotation_supported = rotation;
    }

    /// Make every switch block until the returned sender delivers its
    /// result. Simulates the slow native reconfiguration path.
    #[must_use]
    pub fn block_switches(&self) -> Sender<bool> {
        let (tx, rx) = channel::unbounded();
        self.state.lock().switch_gate = Some(rx);
        tx
    }

    /// Every mode the backend was asked to switch to, in order.
    #[must_use]
    pub fn switch_history(&self) -> Vec<TrackingMode> {
        self.state.lock().switch_history.clone()
    }
}

impl TrackingBackend for VirtualTrackingBackend {
    fn switch_tracking_mode(&self, target: TrackingMode) -> bool {
        // Clone the gate out of the lock so a blocked switch does not hold
        // the state mutex against the test thread.
        let (gate, result) = {
            let mut state = self.state.lock();
            state.switch_history.push(target);
            (state.switch_gate.clone(), state.switch_result)
        };
        match gate {
            Some(rx) => rx.recv().unwrap_or(false),
            None => result,
        }
    }

    fn is_capability_supported(&self, capability: Capability) -> bool {
        let state = self.state.lock();
        match capability {
            Capability::PositionTracking => state.position_supported,
            Capability::RotationTracking => state.rotation_supported,
        }
    }

    fn head_pose_at(&self, _timestamp_ns: u64) -> Option<Pose> {
        let state = self.state.lock();
        state.pose_available.then_some(state.sample.pose)
    }

    fn frame_present_head_pose(&self) -> Option<TimestampedPose> {
        let state = self.state.lock();
        state.pose_available.then_some(state.sample)
    }

    fn hmd_time_nanos(&self) -> u64 {
        self.clock.now_ns()
    }
}

#[derive(Debug, Default)]
struct VirtualCounters {
    present_count: u32,
    extra_frames: u32,
    early_frames: u32,
    dropped_frames: u32,
    latency_ns: u64,
    present_fps: u32,
}

/// Scriptable present-timing counters.
#[derive(Debug, Default)]
pub struct VirtualPresentMetrics {
    state: Mutex<VirtualCounters>,
}

impl VirtualPresentMetrics {
    /// Counters that all read zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-frame present count.
    pub fn set_present_count(&self, value: u32) {
        self.state.lock().present_count = value;
    }

    /// Set the extra-frame counter.
    pub fn set_extra_frames(&self, value: u32) {
        self.state.lock().extra_frames = value;
    }

    /// Set the early-frame counter.
    pub fn set_early_frames(&self, value: u32) {
        self.state.lock().early_frames = value;
    }

    /// Set the dropped-frame counter.
    pub fn set_dropped_frames(&self, value: u32) {
        self.state.lock().dropped_frames = value;
    }

    /// Set the reported frame latency.
    pub fn set_latency_ns(&self, value: u64) {
        self.state.lock().latency_ns = value;
    }

    /// Set the reported presentation rate.
    pub fn set_present_fps(&self, value: u32) {
        self.state.lock().present_fps = value;
    }
}

impl PresentMetricsSource for VirtualPresentMetrics {
    fn frame_present_count(&self) -> u32 {
        self.state.lock().present_count
    }

    fn extra_frame_count(&self) -> u32 {
        self.state.lock().extra_frames
    }

    fn early_frame_count(&self) -> u32 {
        self.state.lock().early_frames
    }

    fn dropped_frame_count(&self) -> u32 {
        self.state.lock().dropped_frames
    }

    fn frame_latency_ns(&self) -> u64 {
        self.state.lock().latency_ns
    }

    fn present_fps(&self) -> u32 {
        self.state.lock().present_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        assert_eq!(clock.now_ns(), 0);
        clock.advance(500);
        clock.advance(250);
        assert_eq!(clock.now_ns(), 750);
        clock.set(10);
        assert_eq!(clock.now_ns(), 10);
    }

    #[test]
    fn test_switch_history_records_targets() {
        let backend = VirtualTrackingBackend::new();
        assert!(backend.switch_tracking_mode(TrackingMode::ThreeDof));
        backend.set_switch_result(false);
        assert!(!backend.switch_tracking_mode(TrackingMode::ZeroDof));
        assert_eq!(
            backend.switch_history(),
            vec![TrackingMode::ThreeDof, TrackingMode::ZeroDof]
        );
    }

    #[test]
    fn test_blocked_switch_waits_for_release() {
        let backend = Arc::new(VirtualTrackingBackend::new());
        let release = backend.block_switches();

        let worker = {
            let backend = Arc::clone(&backend);
            std::thread::spawn(move || backend.switch_tracking_mode(TrackingMode::ThreeDof))
        };

        // The state mutex stays available while the switch is blocked.
        backend.set_pose(Pose::IDENTITY, 5, LostTrackingReason::None);

        release.send(false).expect("worker alive");
        assert_eq!(worker.join().ok(), Some(false));
    }
}

//! Tracking session: lifecycle gate and frame-loop surface.
//!
//! A [`Session`] owns the tracker, pose cache, world calibration, metrics
//! collector and event bus, and is driven by the host's per-frame callback
//! sequence: update, per-eye pre-render, per-eye post-render, end-of-frame,
//! plus the render-thread finish handle. Collaborators are passed in
//! explicitly at creation; there is no global session state.
//!
//! The lifecycle gate is coarse: pose updates, pose queries and frame-stats
//! collection are no-ops unless the session is `Running`.

use std::sync::Arc;

use glam::Mat4;
use openvisor_atomic::{AtomicCounters, CounterSnapshot};
use openvisor_errors::{SessionError, TrackingError, TrackingResult};
use serde::{Deserialize, Serialize};
use tracing::info;
use visor_schemas::prelude::*;

use crate::calibration::WorldCalibration;
use crate::events::{SessionEvent, SessionEvents};
use crate::frame_timing::{
    DEFAULT_FINISH_QUEUE_CAPACITY, DEFAULT_METRICS_WINDOW_NS, DEFAULT_NATIVE_POLL_INTERVAL_NS,
    FrameFinishHandle, FrameMetricsSnapshot, MetricsCollector,
};
use crate::pose::PoseCache;
use crate::ports::{PresentMetricsSource, TrackingBackend};
use crate::tracker::{HeadTracker, OnModeChanged};

/// Default backend switch timeout: five seconds.
pub const DEFAULT_MODE_SWITCH_TIMEOUT_NS: u64 = 5_000_000_000;

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Tracking mode requested at startup (auto-adapted when supported).
    pub initial_mode: TrackingMode,
    /// Degrade the mode to device capabilities instead of failing.
    pub auto_adapt: bool,
    /// Re-cache the world origin on successful mode changes and on pause.
    pub auto_cache_world_pose: bool,
    /// Rolling metrics window on the hardware clock. Default one second.
    pub metrics_window_ns: u64,
    /// Minimum interval between native counter polls. Default 500 ms.
    pub native_poll_interval_ns: u64,
    /// Backend switch timeout; `None` waits forever. Default five seconds.
    pub mode_switch_timeout_ns: Option<u64>,
    /// Event-bus buffer per subscriber. Default 64.
    pub event_capacity: usize,
    /// Render-thread finish queue capacity. Default 64.
    pub finish_queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_mode: TrackingMode::SixDof,
            auto_adapt: true,
            auto_cache_world_pose: true,
            metrics_window_ns: DEFAULT_METRICS_WINDOW_NS,
            native_poll_interval_ns: DEFAULT_NATIVE_POLL_INTERVAL_NS,
            mode_switch_timeout_ns: Some(DEFAULT_MODE_SWITCH_TIMEOUT_NS),
            event_capacity: 64,
            finish_queue_capacity: DEFAULT_FINISH_QUEUE_CAPACITY,
        }
    }
}

/// A head-tracking session.
pub struct Session {
    config: SessionConfig,
    state: SessionState,
    backend: Arc<dyn TrackingBackend>,
    metrics_source: Arc<dyn PresentMetricsSource>,
    tracker: HeadTracker,
    pose_cache: PoseCache,
    calibration: WorldCalibration,
    collector: MetricsCollector,
    events: SessionEvents,
    counters: Arc<AtomicCounters>,
}

impl Session {
    /// Create a session around the given backends.
    ///
    /// The session comes up `Initialized`; call [`start`] to begin tracking.
    /// When auto-adapt is enabled the initial mode degrades to what the
    /// device supports.
    ///
    /// [`start`]: Session::start
    #[must_use]
    pub fn create(
        config: SessionConfig,
        backend: Arc<dyn TrackingBackend>,
        metrics_source: Arc<dyn PresentMetricsSource>,
    ) -> Self {
        let counters = Arc::new(AtomicCounters::new());
        let events = SessionEvents::new(config.event_capacity);
        let tracker = HeadTracker::new(
            Arc::clone(&backend),
            config.initial_mode,
            config.auto_adapt,
            config.auto_cache_world_pose,
            config.mode_switch_timeout_ns,
        );
        let collector = MetricsCollector::new(
            config.metrics_window_ns,
            config.native_poll_interval_ns,
            config.finish_queue_capacity,
            Arc::clone(&counters),
        );

        info!(initial_mode = %tracker.mode(), "session created");
        events.emit(SessionEvent::StateChanged {
            from: SessionState::Uninitialized,
            to: SessionState::Initialized,
        });

        Self {
            config,
            state: SessionState::Initialized,
            backend,
            metrics_source,
            tracker,
            pose_cache: PoseCache::new(),
            calibration: WorldCalibration::new(),
            collector,
            events,
            counters,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// The session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The event bus, for subscribing.
    #[must_use]
    pub const fn events(&self) -> &SessionEvents {
        &self.events
    }

    /// Snapshot of the bookkeeping counters.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// The last saved frame metrics averages.
    #[must_use]
    pub fn metrics_snapshot(&self) -> FrameMetricsSnapshot {
        self.collector.snapshot()
    }

    fn transition(&mut self, to: SessionState) -> Result<(), SessionError> {
        if self.state == SessionState::Destroyed {
            return Err(SessionError::Destroyed);
        }
        if !self.state.can_transition_to(to) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        let from = self.state;
        self.state = to;
        info!(%from, %to, "session state changed");
        self.events.emit(SessionEvent::StateChanged { from, to });
        Ok(())
    }

    /// Start tracking.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTransition`] unless the session is
    /// `Initialized`, or [`SessionError::Destroyed`] after destruction.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Running)?;
        let now = self.backend.hmd_time_nanos();
        self.collector.reset_all(now);
        Ok(())
    }

    /// Suspend tracking.
    ///
    /// When auto-cache is enabled the world origin is re-cached so that the
    /// scene resumes where the user left it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTransition`] unless the session is
    /// `Running`, or [`SessionError::Destroyed`] after destruction.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Paused)?;
        if self.config.auto_cache_world_pose {
            self.cache_world_origin();
        }
        Ok(())
    }

    /// Resume tracking after a pause. Frame metrics start over.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTransition`] unless the session is
    /// `Paused`, or [`SessionError::Destroyed`] after destruction.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Running)?;
        let now = self.backend.hmd_time_nanos();
        self.collector.reset_all(now);
        Ok(())
    }

    /// Tear the session down. Terminal.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Destroyed`] when already destroyed.
    pub fn destroy(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Destroyed)
    }

    // --- frame loop -----------------------------------------------------

    /// Update hook: runs once per engine frame before anything reads poses.
    ///
    /// Applies settled mode switches, refreshes the pose cache, edge-detects
    /// tracking health, and stamps the frame's update time.
    pub fn on_update(&mut self, frame_idx: u64) {
        let now = self.backend.hmd_time_nanos();
        self.tracker.drain_completions(
            now,
            &self.events,
            &self.counters,
            &mut self.calibration,
            &mut self.pose_cache,
        );

        if !self.state.is_running() {
            return;
        }

        if self.pose_cache.pre_update(&*self.backend) {
            self.counters.inc_pose_update();
        }
        self.tracker
            .check_tracking_state(true, self.pose_cache.lost_reason(), &self.events);
        self.collector.on_update(frame_idx, now);
    }

    /// Per-eye pre-render hook.
    ///
    /// The left eye additionally reaps finished frames and stamps the
    /// frame's present time from the pose cache.
    pub fn on_camera_pre_render(&mut self, eye: Eye, frame_idx: u64) {
        if !self.state.is_running() {
            return;
        }
        let now = self.backend.hmd_time_nanos();
        if eye == Eye::Left {
            self.collector.drain_finish_signals();
            self.collector
                .check_finished(true, &*self.metrics_source, now);
            self.collector
                .on_pre_render(eye, frame_idx, now, self.pose_cache.timestamp_ns());
        } else {
            self.collector.on_pre_render(eye, frame_idx, now, 0);
        }
    }

    /// Per-eye post-render hook.
    pub fn on_camera_post_render(&mut self, eye: Eye, frame_idx: u64) {
        if !self.state.is_running() {
            return;
        }
        let now = self.backend.hmd_time_nanos();
        self.collector.on_post_render(eye, frame_idx, now);
    }

    /// Main-thread end-of-frame hook.
    pub fn on_end_of_frame(&mut self, frame_idx: u64) {
        if !self.state.is_running() {
            return;
        }
        let now = self.backend.hmd_time_nanos();
        self.collector.on_end_of_frame(frame_idx, now);
    }

    /// Handle for the render thread to signal end-of-frame.
    #[must_use]
    pub fn frame_finish_handle(&self) -> FrameFinishHandle {
        self.collector.finish_handle()
    }

    // --- pose queries ---------------------------------------------------

    /// Head pose in application world space for the current frame.
    ///
    /// # Errors
    ///
    /// [`TrackingError::SessionNotRunning`] while the session is not
    /// running; callers are expected to check this every frame rather than
    /// treat it as fatal.
    pub fn head_pose(&self) -> TrackingResult<Pose> {
        if !self.state.is_running() {
            self.counters.inc_stale_pose_query();
            return Err(TrackingError::SessionNotRunning);
        }
        let raw = self.tracker.raw_pose_for_mode(&self.pose_cache);
        Ok(if self.calibration.is_identity() {
            raw
        } else {
            self.calibration.apply(&raw)
        })
    }

    /// Head pose in application world space at a specific timestamp.
    ///
    /// # Errors
    ///
    /// [`TrackingError::SessionNotRunning`] while the session is not
    /// running; [`TrackingError::PoseNotReady`] when the backend has no
    /// pose for that time.
    pub fn head_pose_at(&self, timestamp_ns: u64) -> TrackingResult<Pose> {
        if !self.state.is_running() {
            self.counters.inc_stale_pose_query();
            return Err(TrackingError::SessionNotRunning);
        }
        self.tracker
            .head_pose_at(timestamp_ns, &self.pose_cache, &self.calibration)
            .ok_or(TrackingError::PoseNotReady)
    }

    /// The raw cached sample (device space), regardless of session state.
    #[must_use]
    pub fn head_pose_sample(&self) -> TimestampedPose {
        self.pose_cache.sample()
    }

    /// Whether a head pose was successfully fetched this frame.
    #[must_use]
    pub fn is_head_pose_ready(&self) -> bool {
        self.pose_cache.is_ready()
    }

    // --- tracking mode --------------------------------------------------

    /// The tracking mode currently in effect.
    #[must_use]
    pub fn tracking_mode(&self) -> TrackingMode {
        self.tracker.mode()
    }

    /// Whether a mode change is in flight.
    #[must_use]
    pub fn is_mode_changing(&self) -> bool {
        self.tracker.is_mode_changing()
    }

    /// Request an exact tracking mode (no capability fallback applied).
    pub fn request_tracking_mode(
        &mut self,
        target: TrackingMode,
        callback: Option<OnModeChanged>,
    ) -> bool {
        let cache_pose = self.capture_cache_pose();
        let now = self.backend.hmd_time_nanos();
        self.tracker.request_mode(
            target,
            cache_pose,
            now,
            &self.events,
            &self.counters,
            callback,
        )
    }

    /// Request 6-DoF tracking, degraded to what the device supports.
    pub fn request_6dof(&mut self, callback: Option<OnModeChanged>) -> bool {
        self.request_adapted(TrackingMode::SixDof, callback)
    }

    /// Request 3-DoF tracking, degraded to what the device supports.
    pub fn request_3dof(&mut self, callback: Option<OnModeChanged>) -> bool {
        self.request_adapted(TrackingMode::ThreeDof, callback)
    }

    /// Request 0-DoF tracking.
    pub fn request_0dof(&mut self, callback: Option<OnModeChanged>) -> bool {
        self.request_adapted(TrackingMode::ZeroDof, callback)
    }

    /// Request stable 0-DoF tracking, degraded to what the device supports.
    pub fn request_0dof_stable(&mut self, callback: Option<OnModeChanged>) -> bool {
        self.request_adapted(TrackingMode::ZeroDofStable, callback)
    }

    fn request_adapted(&mut self, mode: TrackingMode, callback: Option<OnModeChanged>) -> bool {
        let target = self.tracker.adapted(mode);
        self.request_tracking_mode(target, callback)
    }

    // --- world calibration ----------------------------------------------

    /// Re-cache the world origin at the current pose.
    pub fn cache_world_origin(&mut self) {
        let pose = self.capture_cache_pose();
        self.calibration.cache_from_pose(&pose);
        self.pose_cache.reset();
        self.counters.inc_world_recalibration();
        self.events.emit(SessionEvent::WorldPoseReset);
    }

    /// Reset the world origin so the current pose becomes the zero
    /// reference. See [`WorldCalibration::reset_from_live_pose`].
    pub fn reset_world_origin(&mut self, reset_pitch: bool) {
        let raw = self.tracker.raw_pose_for_mode(&self.pose_cache);
        let live = self.calibration.apply(&raw);
        self.calibration.reset_from_live_pose(&live, reset_pitch);
        self.counters.inc_world_recalibration();
        self.events.emit(SessionEvent::WorldPoseReset);
    }

    /// The cached world matrix.
    #[must_use]
    pub fn world_matrix(&self) -> Mat4 {
        self.calibration.matrix()
    }

    /// The pitch adjustment captured by the last world reset, in degrees.
    #[must_use]
    pub fn cached_world_pitch_deg(&self) -> f32 {
        self.calibration.cached_pitch_deg()
    }

    /// The world pose snapshot used to seed re-caching.
    ///
    /// Position is only meaningful in 6-DoF (the neck-model offset of the
    /// rotational modes is ignored), and stable 0-DoF keeps the anchor
    /// rotation instead of the smoothed head rotation.
    fn capture_cache_pose(&self) -> Pose {
        let raw = self.tracker.raw_pose_for_mode(&self.pose_cache);
        let mut pose = self.calibration.apply(&raw);
        let anchor = self.calibration.anchor_pose();
        if self.tracker.mode() != TrackingMode::SixDof {
            pose.position = anchor.position;
        }
        if self.tracker.mode() == TrackingMode::ZeroDofStable {
            pose.rotation = anchor.rotation;
        }
        pose
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_backend::{VirtualPresentMetrics, VirtualTrackingBackend};
    use glam::{Quat, Vec3};
    use std::time::Duration;

    fn session_with(backend: Arc<VirtualTrackingBackend>) -> Session {
        Session::create(
            SessionConfig::default(),
            backend,
            Arc::new(VirtualPresentMetrics::new()),
        )
    }

    fn settle(session: &mut Session, frame_idx: u64) {
        for _ in 0..500 {
            session.on_update(frame_idx);
            if !session.is_mode_changing() {
                return;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        panic!("mode change did not settle");
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let backend = Arc::new(VirtualTrackingBackend::new());
        let mut session = session_with(backend);
        assert_eq!(session.state(), SessionState::Initialized);

        session.start().expect("start");
        assert_eq!(session.state(), SessionState::Running);
        session.pause().expect("pause");
        assert_eq!(session.state(), SessionState::Paused);
        session.resume().expect("resume");
        session.destroy().expect("destroy");
        assert_eq!(session.state(), SessionState::Destroyed);
    }

    #[test]
    fn test_invalid_transitions_error() {
        let backend = Arc::new(VirtualTrackingBackend::new());
        let mut session = session_with(backend);

        assert_eq!(
            session.pause(),
            Err(SessionError::InvalidTransition {
                from: SessionState::Initialized,
                to: SessionState::Paused,
            })
        );

        session.destroy().expect("destroy");
        assert_eq!(session.start(), Err(SessionError::Destroyed));
    }

    #[test]
    fn test_pose_queries_gated_by_running() {
        let backend = Arc::new(VirtualTrackingBackend::new());
        backend.set_pose(
            Pose::new(Vec3::new(0.0, 1.6, 0.0), Quat::IDENTITY),
            1_000,
            LostTrackingReason::None,
        );
        let mut session = session_with(Arc::clone(&backend));

        assert_eq!(session.head_pose(), Err(TrackingError::SessionNotRunning));
        assert_eq!(session.counters().stale_pose_queries, 1);

        session.start().expect("start");
        session.on_update(0);
        let pose = session.head_pose().expect("pose while running");
        assert!((pose.position.y - 1.6).abs() < 1e-6);
        assert_eq!(session.counters().pose_updates, 1);
    }

    #[test]
    fn test_update_is_noop_while_paused() {
        let backend = Arc::new(VirtualTrackingBackend::new());
        backend.set_pose(Pose::IDENTITY, 500, LostTrackingReason::None);
        let mut session = session_with(Arc::clone(&backend));
        session.start().expect("start");
        session.on_update(0);
        session.pause().expect("pause");

        backend.set_pose(
            Pose::new(Vec3::ONE, Quat::IDENTITY),
            2_000,
            LostTrackingReason::None,
        );
        session.on_update(1);
        // Pose cache was reset by the pause-time world re-cache and must not
        // pick the new sample up while paused.
        assert_eq!(session.head_pose_sample().timestamp_ns, 0);
        assert_eq!(session.counters().pose_updates, 1);
    }

    #[test]
    fn test_pause_caches_world_origin() {
        let backend = Arc::new(VirtualTrackingBackend::new());
        let head = Pose::new(Vec3::new(0.4, 1.7, -0.2), Quat::from_rotation_y(0.6));
        backend.set_pose(head, 1_000, LostTrackingReason::None);

        let mut session = session_with(Arc::clone(&backend));
        session.start().expect("start");
        session.on_update(0);
        assert!(session.world_matrix() == Mat4::IDENTITY);

        session.pause().expect("pause");
        assert!(session.world_matrix() != Mat4::IDENTITY);
        assert_eq!(session.counters().world_recalibrations, 1);
    }

    #[test]
    fn test_adapted_request_reaches_backend_with_fallback_mode() {
        // Position tracking unsupported: a 6-DoF request is transparently
        // degraded to 3-DoF and that is what the backend sees.
        let backend = Arc::new(VirtualTrackingBackend::with_capabilities(false, true));
        let mut config = SessionConfig::default();
        config.initial_mode = TrackingMode::ZeroDof;
        let mut session = Session::create(
            config,
            Arc::clone(&backend) as Arc<dyn TrackingBackend>,
            Arc::new(VirtualPresentMetrics::new()),
        );
        session.start().expect("start");

        assert!(session.request_6dof(None));
        settle(&mut session, 1);

        assert_eq!(session.tracking_mode(), TrackingMode::ThreeDof);
        assert_eq!(backend.switch_history(), vec![TrackingMode::ThreeDof]);
    }

    #[test]
    fn test_initial_mode_degrades_at_create() {
        let backend = Arc::new(VirtualTrackingBackend::with_capabilities(false, true));
        let session = session_with(backend);
        assert_eq!(session.tracking_mode(), TrackingMode::ThreeDof);
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = SessionConfig {
            initial_mode: TrackingMode::ThreeDof,
            mode_switch_timeout_ns: None,
            ..SessionConfig::default()
        };
        let json = serde_json::to_string(&config).expect("serialize");
        let back: SessionConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.initial_mode, TrackingMode::ThreeDof);
        assert_eq!(back.mode_switch_timeout_ns, None);
        assert_eq!(back.metrics_window_ns, config.metrics_window_ns);
    }

    #[test]
    fn test_reset_world_origin_zeroes_current_view() {
        let backend = Arc::new(VirtualTrackingBackend::new());
        let head = Pose::new(
            Vec3::new(0.3, 1.5, -0.7),
            Quat::from_euler(glam::EulerRot::YXZ, 0.7, 0.12, 0.0),
        );
        backend.set_pose(head, 1_000, LostTrackingReason::None);

        let mut session = session_with(Arc::clone(&backend));
        session.start().expect("start");
        session.on_update(0);

        session.reset_world_origin(false);
        let pose = session.head_pose().expect("pose");
        assert!(pose.position.length() < 1e-4);
        let (yaw, pitch, _) = pose.rotation.to_euler(glam::EulerRot::YXZ);
        assert!(yaw.abs() < 1e-3);
        assert!((pitch - 0.12).abs() < 1e-3);
    }
}

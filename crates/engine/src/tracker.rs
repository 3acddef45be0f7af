//! Tracking-mode state machine.
//!
//! The head tracker owns the active [`TrackingMode`] and the one operation
//! that cannot run on the frame loop: switching modes in the backend, which
//! may block for a long time. Switch requests are handed to a dedicated
//! worker thread; completions are marshaled back over a channel and applied
//! on the update thread in [`drain_completions`], so every piece of shared
//! state (current mode, calibration, pose cache) stays single-threaded.
//!
//! At most one change is in flight: a request made while another is pending
//! fails synchronously through its callback. There is no cancellation; an
//! optional timeout force-clears the lock and discards the late completion
//! by sequence number.
//!
//! [`drain_completions`]: HeadTracker::drain_completions

use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use glam::Vec3;
use openvisor_atomic::AtomicCounters;
use tracing::{debug, info, warn};
use visor_schemas::prelude::*;

use crate::calibration::WorldCalibration;
use crate::events::{SessionEvent, SessionEvents};
use crate::pose::PoseCache;
use crate::ports::TrackingBackend;

/// Callback invoked on the update thread when a mode change settles.
pub type OnModeChanged = Box<dyn FnOnce(TrackingModeChangedResult) + Send + 'static>;

struct ModeSwitchRequest {
    seq: u64,
    target: TrackingMode,
}

struct ModeSwitchCompletion {
    seq: u64,
    target: TrackingMode,
    success: bool,
}

/// Background worker that runs the blocking backend switch.
struct ModeSwitchWorker {
    request_tx: Sender<ModeSwitchRequest>,
    completion_rx: Receiver<ModeSwitchCompletion>,
    _handle: thread::JoinHandle<()>,
}

impl ModeSwitchWorker {
    fn spawn(backend: Arc<dyn TrackingBackend>) -> Self {
        let (request_tx, request_rx) = channel::unbounded::<ModeSwitchRequest>();
        let (completion_tx, completion_rx) = channel::unbounded();

        let handle = thread::spawn(move || {
            while let Ok(request) = request_rx.recv() {
                debug!(target_mode = %request.target, seq = request.seq, "backend mode switch begin");
                let success = backend.switch_tracking_mode(request.target);
                debug!(target_mode = %request.target, seq = request.seq, success, "backend mode switch end");
                if completion_tx
                    .send(ModeSwitchCompletion {
                        seq: request.seq,
                        target: request.target,
                        success,
                    })
                    .is_err()
                {
                    break;
                }
            }
        });

        Self {
            request_tx,
            completion_rx,
            _handle: handle,
        }
    }

    fn dispatch(&self, request: ModeSwitchRequest) -> bool {
        self.request_tx.send(request).is_ok()
    }

    fn try_completion(&self) -> Option<ModeSwitchCompletion> {
        self.completion_rx.try_recv().ok()
    }
}

struct PendingChange {
    seq: u64,
    target: TrackingMode,
    requested_at_ns: u64,
    cache_pose: Pose,
    callback: Option<OnModeChanged>,
}

/// The tracking-mode state machine.
pub struct HeadTracker {
    backend: Arc<dyn TrackingBackend>,
    worker: ModeSwitchWorker,
    mode: TrackingMode,
    auto_adapt: bool,
    auto_cache_world_pose: bool,
    switch_timeout_ns: Option<u64>,
    pending: Option<PendingChange>,
    next_seq: u64,
    last_reason: LostTrackingReason,
}

impl HeadTracker {
    /// Create a tracker and, when auto-adapt is enabled, degrade the initial
    /// mode to whatever the device actually supports.
    #[must_use]
    pub fn new(
        backend: Arc<dyn TrackingBackend>,
        initial_mode: TrackingMode,
        auto_adapt: bool,
        auto_cache_world_pose: bool,
        switch_timeout_ns: Option<u64>,
    ) -> Self {
        let worker = ModeSwitchWorker::spawn(Arc::clone(&backend));
        let mut tracker = Self {
            backend,
            worker,
            mode: initial_mode,
            auto_adapt,
            auto_cache_world_pose,
            switch_timeout_ns,
            pending: None,
            next_seq: 0,
            last_reason: LostTrackingReason::None,
        };
        tracker.auto_adapt_mode();
        tracker
    }

    /// The tracking mode currently in effect.
    #[must_use]
    pub const fn mode(&self) -> TrackingMode {
        self.mode
    }

    /// Whether a mode change is in flight.
    #[must_use]
    pub const fn is_mode_changing(&self) -> bool {
        self.pending.is_some()
    }

    /// Degrade a mode to what the device supports.
    ///
    /// Total function: SixDof falls back to ThreeDof and then ZeroDof,
    /// ThreeDof and ZeroDofStable fall back to ZeroDof, and ZeroDof is
    /// always supported.
    #[must_use]
    pub fn adapt_tracking_mode(backend: &dyn TrackingBackend, mode: TrackingMode) -> TrackingMode {
        match mode {
            TrackingMode::SixDof => {
                if backend.is_capability_supported(Capability::PositionTracking) {
                    TrackingMode::SixDof
                } else if backend.is_capability_supported(Capability::RotationTracking) {
                    TrackingMode::ThreeDof
                } else {
                    TrackingMode::ZeroDof
                }
            }
            TrackingMode::ThreeDof => {
                if backend.is_capability_supported(Capability::RotationTracking) {
                    TrackingMode::ThreeDof
                } else {
                    TrackingMode::ZeroDof
                }
            }
            TrackingMode::ZeroDofStable => {
                if backend.is_capability_supported(Capability::RotationTracking) {
                    TrackingMode::ZeroDofStable
                } else {
                    TrackingMode::ZeroDof
                }
            }
            TrackingMode::ZeroDof => TrackingMode::ZeroDof,
        }
    }

    /// Apply the capability fallback to the current mode (no-op unless
    /// auto-adapt is enabled).
    pub fn auto_adapt_mode(&mut self) {
        if !self.auto_adapt {
            return;
        }
        let adjusted = Self::adapt_tracking_mode(&*self.backend, self.mode);
        if adjusted != self.mode {
            warn!(from = %self.mode, to = %adjusted, "auto-adapted tracking mode");
            self.mode = adjusted;
        }
    }

    /// The mode a request for `mode` would actually ask the backend for.
    #[must_use]
    pub fn adapted(&self, mode: TrackingMode) -> TrackingMode {
        Self::adapt_tracking_mode(&*self.backend, mode)
    }

    /// Request a tracking-mode change.
    ///
    /// Rejects synchronously (callback with `success == false` and the
    /// unchanged mode) when the target equals the current mode or another
    /// change is in flight. Otherwise emits [`SessionEvent::ModeChanging`],
    /// locks, and dispatches the blocking switch to the worker thread.
    ///
    /// `cache_pose` is the world pose captured before the switch; on success
    /// it seeds the world-matrix re-cache so the scene does not jump across
    /// the mode boundary. Returns whether the request was dispatched.
    pub fn request_mode(
        &mut self,
        target: TrackingMode,
        cache_pose: Pose,
        now_ns: u64,
        events: &SessionEvents,
        counters: &AtomicCounters,
        callback: Option<OnModeChanged>,
    ) -> bool {
        counters.inc_mode_change_requested();
        info!(from = %self.mode, to = %target, "tracking mode change requested");

        if target == self.mode || self.pending.is_some() {
            counters.inc_mode_change_rejected();
            warn!(
                locked = self.pending.is_some(),
                "tracking mode change rejected"
            );
            if let Some(callback) = callback {
                callback(TrackingModeChangedResult {
                    success: false,
                    mode: self.mode,
                });
            }
            return false;
        }

        events.emit(SessionEvent::ModeChanging {
            from: self.mode,
            to: target,
        });

        let seq = self.next_seq;
        self.next_seq += 1;

        if !self.worker.dispatch(ModeSwitchRequest { seq, target }) {
            counters.inc_mode_change_failed();
            warn!("mode switch worker unavailable");
            let result = TrackingModeChangedResult {
                success: false,
                mode: self.mode,
            };
            if let Some(callback) = callback {
                callback(result);
            }
            events.emit(SessionEvent::ModeChanged(result));
            return false;
        }

        self.pending = Some(PendingChange {
            seq,
            target,
            requested_at_ns: now_ns,
            cache_pose,
            callback,
        });
        true
    }

    /// Apply finished (or timed-out) mode switches on the update thread.
    ///
    /// On success the current mode advances and, when auto-cache is on, the
    /// world matrix is re-cached from the pre-switch pose and the pose cache
    /// reset. On failure the mode is unchanged. Either way the lock clears,
    /// the request callback runs, and [`SessionEvent::ModeChanged`] is
    /// emitted. A completion whose sequence number no longer matches (its
    /// request timed out earlier) is discarded.
    pub fn drain_completions(
        &mut self,
        now_ns: u64,
        events: &SessionEvents,
        counters: &AtomicCounters,
        calibration: &mut WorldCalibration,
        pose_cache: &mut PoseCache,
    ) {
        if let Some(timeout_ns) = self.switch_timeout_ns {
            let timed_out = self
                .pending
                .as_ref()
                .is_some_and(|p| now_ns.saturating_sub(p.requested_at_ns) >= timeout_ns);
            if timed_out {
                if let Some(pending) = self.pending.take() {
                    counters.inc_mode_change_timed_out();
                    warn!(
                        target_mode = %pending.target,
                        timeout_ns,
                        "mode switch timed out; lock released"
                    );
                    let result = TrackingModeChangedResult {
                        success: false,
                        mode: self.mode,
                    };
                    if let Some(callback) = pending.callback {
                        callback(result);
                    }
                    events.emit(SessionEvent::ModeChanged(result));
                }
            }
        }

        while let Some(completion) = self.worker.try_completion() {
            let matches = self
                .pending
                .as_ref()
                .is_some_and(|p| p.seq == completion.seq);
            if !matches {
                debug!(seq = completion.seq, "stale mode switch completion discarded");
                continue;
            }
            let Some(pending) = self.pending.take() else {
                continue;
            };

            if completion.success {
                self.mode = completion.target;
                if self.auto_cache_world_pose {
                    calibration.cache_from_pose(&pending.cache_pose);
                    pose_cache.reset();
                    counters.inc_world_recalibration();
                    events.emit(SessionEvent::WorldPoseReset);
                }
            } else {
                counters.inc_mode_change_failed();
            }

            let result = TrackingModeChangedResult {
                success: completion.success,
                mode: self.mode,
            };
            info!(success = result.success, mode = %result.mode, "tracking mode change settled");
            if let Some(callback) = pending.callback {
                callback(result);
            }
            events.emit(SessionEvent::ModeChanged(result));
        }
    }

    /// Edge-detect lost/recovered tracking from the pose cache's reason.
    ///
    /// Skipped while the session is not running, in the 0-DoF modes (no
    /// tracking to lose), and mid-mode-change (the backend reports transient
    /// reasons during a switch).
    pub fn check_tracking_state(
        &mut self,
        running: bool,
        reason: LostTrackingReason,
        events: &SessionEvents,
    ) {
        if !running
            || matches!(
                self.mode,
                TrackingMode::ZeroDof | TrackingMode::ZeroDofStable
            )
            || self.pending.is_some()
        {
            return;
        }

        if reason != self.last_reason {
            info!(from = %self.last_reason, to = %reason, "tracking health changed");
            if reason != LostTrackingReason::None && self.last_reason == LostTrackingReason::None {
                events.emit(SessionEvent::LostTracking(reason));
            } else if reason == LostTrackingReason::None
                && self.last_reason != LostTrackingReason::None
            {
                events.emit(SessionEvent::PoseReady);
            }
            self.last_reason = reason;
        }
    }

    /// The raw pose the current mode exposes, before calibration.
    ///
    /// ZeroDof pins the head at the origin; ZeroDofStable keeps rotation to
    /// smooth the static pose but zeroes position.
    #[must_use]
    pub fn raw_pose_for_mode(&self, pose_cache: &PoseCache) -> Pose {
        match self.mode {
            TrackingMode::ZeroDof => Pose::IDENTITY,
            TrackingMode::ZeroDofStable => {
                Pose::from_raw(Vec3::ZERO, pose_cache.head_pose().rotation)
            }
            TrackingMode::SixDof | TrackingMode::ThreeDof => pose_cache.head_pose(),
        }
    }

    /// Head pose at a timestamp, in application world space.
    ///
    /// For the cached timestamp the cached pose is used; other timestamps go
    /// to the backend. Returns `None` when the backend has no pose for that
    /// time.
    #[must_use]
    pub fn head_pose_at(
        &self,
        timestamp_ns: u64,
        pose_cache: &PoseCache,
        calibration: &WorldCalibration,
    ) -> Option<Pose> {
        let raw = if self.mode == TrackingMode::ZeroDof {
            Pose::IDENTITY
        } else {
            let pose = if timestamp_ns == pose_cache.timestamp_ns() {
                pose_cache.head_pose()
            } else {
                self.backend.head_pose_at(timestamp_ns)?
            };
            if self.mode == TrackingMode::ZeroDofStable {
                Pose::from_raw(Vec3::ZERO, pose.rotation)
            } else {
                pose
            }
        };

        Some(if calibration.is_identity() {
            raw
        } else {
            calibration.apply(&raw)
        })
    }
}

//! Atomic counters for frame-loop bookkeeping.
//!
//! This module provides [`AtomicCounters`], a collection of atomic counters
//! that can be safely incremented from the per-frame hot path without
//! allocations or blocking.
//!
//! # Hot-path safety
//!
//! All methods use `Ordering::Relaxed`: the counters are eventually
//! consistent telemetry, individual increments do not need to synchronize
//! with other memory operations, and each call compiles to a single atomic
//! instruction on mainstream targets.

use core::sync::atomic::{AtomicU64, Ordering};

/// Counter snapshot returned by [`AtomicCounters::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    /// Frame records opened (first touch of a frame index)
    pub frames_opened: u64,
    /// Frame records marked finished by the render-thread signal
    pub frames_finished: u64,
    /// Frame records folded into rolling metrics
    pub frames_aggregated: u64,
    /// Frame records dropped for missing or invalid timestamps
    pub frames_dropped_invalid: u64,
    /// Pose-cache updates written by the pre-update hook
    pub pose_updates: u64,
    /// Pose queries made while the session was not running
    pub stale_pose_queries: u64,
    /// Tracking-mode changes requested
    pub mode_changes_requested: u64,
    /// Tracking-mode changes rejected (same mode or change in flight)
    pub mode_changes_rejected: u64,
    /// Tracking-mode changes that failed in the backend
    pub mode_changes_failed: u64,
    /// Tracking-mode changes abandoned by the switch timeout
    pub mode_changes_timed_out: u64,
    /// World-calibration recomputes (cache or reset)
    pub world_recalibrations: u64,
}

/// Atomic counters for frame-loop bookkeeping.
///
/// All `inc_*` methods are hot-path safe: a single relaxed atomic fetch-add,
/// no heap allocation, no blocking.
///
/// # Example
///
/// ```rust
/// use openvisor_atomic::AtomicCounters;
///
/// let counters = AtomicCounters::new();
/// counters.inc_pose_update();
/// counters.inc_mode_change_requested();
///
/// let snapshot = counters.snapshot();
/// assert_eq!(snapshot.pose_updates, 1);
/// assert_eq!(snapshot.mode_changes_requested, 1);
/// ```
#[derive(Debug, Default)]
pub struct AtomicCounters {
    frames_opened: AtomicU64,
    frames_finished: AtomicU64,
    frames_aggregated: AtomicU64,
    frames_dropped_invalid: AtomicU64,
    pose_updates: AtomicU64,
    stale_pose_queries: AtomicU64,
    mode_changes_requested: AtomicU64,
    mode_changes_rejected: AtomicU64,
    mode_changes_failed: AtomicU64,
    mode_changes_timed_out: AtomicU64,
    world_recalibrations: AtomicU64,
}

impl AtomicCounters {
    /// Create a new `AtomicCounters` with all counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames_opened: AtomicU64::new(0),
            frames_finished: AtomicU64::new(0),
            frames_aggregated: AtomicU64::new(0),
            frames_dropped_invalid: AtomicU64::new(0),
            pose_updates: AtomicU64::new(0),
            stale_pose_queries: AtomicU64::new(0),
            mode_changes_requested: AtomicU64::new(0),
            mode_changes_rejected: AtomicU64::new(0),
            mode_changes_failed: AtomicU64::new(0),
            mode_changes_timed_out: AtomicU64::new(0),
            world_recalibrations: AtomicU64::new(0),
        }
    }

    /// Increment the opened-frame counter.
    #[inline]
    pub fn inc_frames_opened(&self) {
        self.frames_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the finished-frame counter.
    #[inline]
    pub fn inc_frames_finished(&self) {
        self.frames_finished.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the aggregated-frame counter.
    #[inline]
    pub fn inc_frames_aggregated(&self) {
        self.frames_aggregated.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the invalid-frame-drop counter.
    #[inline]
    pub fn inc_frames_dropped_invalid(&self) {
        self.frames_dropped_invalid.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the pose-update counter.
    #[inline]
    pub fn inc_pose_update(&self) {
        self.pose_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the stale-pose-query counter.
    #[inline]
    pub fn inc_stale_pose_query(&self) {
        self.stale_pose_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the mode-change-requested counter.
    #[inline]
    pub fn inc_mode_change_requested(&self) {
        self.mode_changes_requested.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the mode-change-rejected counter.
    #[inline]
    pub fn inc_mode_change_rejected(&self) {
        self.mode_changes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the mode-change-failed counter.
    #[inline]
    pub fn inc_mode_change_failed(&self) {
        self.mode_changes_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the mode-change-timeout counter.
    #[inline]
    pub fn inc_mode_change_timed_out(&self) {
        self.mode_changes_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the world-recalibration counter.
    #[inline]
    pub fn inc_world_recalibration(&self) {
        self.world_recalibrations.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a consistent-enough snapshot of all counters.
    ///
    /// Individual loads are relaxed; the snapshot is not a cross-counter
    /// atomic cut, which is acceptable for telemetry.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            frames_opened: self.frames_opened.load(Ordering::Relaxed),
            frames_finished: self.frames_finished.load(Ordering::Relaxed),
            frames_aggregated: self.frames_aggregated.load(Ordering::Relaxed),
            frames_dropped_invalid: self.frames_dropped_invalid.load(Ordering::Relaxed),
            pose_updates: self.pose_updates.load(Ordering::Relaxed),
            stale_pose_queries: self.stale_pose_queries.load(Ordering::Relaxed),
            mode_changes_requested: self.mode_changes_requested.load(Ordering::Relaxed),
            mode_changes_rejected: self.mode_changes_rejected.load(Ordering::Relaxed),
            mode_changes_failed: self.mode_changes_failed.load(Ordering::Relaxed),
            mode_changes_timed_out: self.mode_changes_timed_out.load(Ordering::Relaxed),
            world_recalibrations: self.world_recalibrations.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.frames_opened.store(0, Ordering::Relaxed);
        self.frames_finished.store(0, Ordering::Relaxed);
        self.frames_aggregated.store(0, Ordering::Relaxed);
        self.frames_dropped_invalid.store(0, Ordering::Relaxed);
        self.pose_updates.store(0, Ordering::Relaxed);
        self.stale_pose_queries.store(0, Ordering::Relaxed);
        self.mode_changes_requested.store(0, Ordering::Relaxed);
        self.mode_changes_rejected.store(0, Ordering::Relaxed);
        self.mode_changes_failed.store(0, Ordering::Relaxed);
        self.mode_changes_timed_out.store(0, Ordering::Relaxed);
        self.world_recalibrations.store(0, Ordering::Relaxed);
    }
}

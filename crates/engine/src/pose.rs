//! Per-frame head pose cache.
//!
//! Written once per frame by the pre-update hook, read by everything else.
//! The cached pose is raw device space; world-space consumers compose it
//! with the calibration.

use tracing::debug;
use visor_schemas::prelude::*;

use crate::ports::TrackingBackend;

/// Last known head pose, hardware timestamp and tracking health.
#[derive(Debug, Clone)]
pub struct PoseCache {
    sample: TimestampedPose,
    ready: bool,
}

impl Default for PoseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseCache {
    /// An empty cache: identity pose, timestamp zero, not ready.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sample: TimestampedPose::INITIAL,
            ready: false,
        }
    }

    /// The full cached sample.
    #[must_use]
    pub const fn sample(&self) -> TimestampedPose {
        self.sample
    }

    /// The cached raw head pose.
    #[must_use]
    pub const fn head_pose(&self) -> Pose {
        self.sample.pose
    }

    /// Hardware timestamp of the cached pose in nanoseconds.
    #[must_use]
    pub const fn timestamp_ns(&self) -> u64 {
        self.sample.timestamp_ns
    }

    /// The backend's current lost-tracking reason.
    #[must_use]
    pub const fn lost_reason(&self) -> LostTrackingReason {
        self.sample.lost_reason
    }

    /// Whether a head pose has been successfully fetched this frame.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Fetch the frame-present head pose from the backend.
    ///
    /// Called once per frame before anything consumes the pose. While the
    /// backend reports `Initializing` the previous pose and timestamp are
    /// kept (the reason still updates), so consumers never see the
    /// half-valid poses produced during startup. Returns whether the fetch
    /// succeeded.
    pub fn pre_update(&mut self, backend: &dyn TrackingBackend) -> bool {
        let Some(sample) = backend.frame_present_head_pose() else {
            self.ready = false;
            return false;
        };

        if sample.lost_reason == LostTrackingReason::Initializing {
            self.sample.lost_reason = sample.lost_reason;
            debug!(timestamp_ns = sample.timestamp_ns, "pose still initializing");
        } else {
            self.sample = sample;
        }
        self.ready = true;
        true
    }

    /// Reset to the identity pose at timestamp zero.
    ///
    /// Used when the world origin is re-cached, so the first frame after a
    /// recalibration does not blend the old pose into the new origin.
    pub fn reset(&mut self) {
        self.sample.pose = Pose::IDENTITY;
        self.sample.timestamp_ns = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_backend::VirtualTrackingBackend;
    use glam::Vec3;

    #[test]
    fn test_pre_update_caches_sample() {
        let backend = VirtualTrackingBackend::new();
        let pose = Pose::new(Vec3::new(0.0, 1.6, 0.0), glam::Quat::IDENTITY);
        backend.set_pose(pose, 1_000, LostTrackingReason::None);

        let mut cache = PoseCache::new();
        assert!(!cache.is_ready());
        assert!(cache.pre_update(&backend));
        assert!(cache.is_ready());
        assert_eq!(cache.timestamp_ns(), 1_000);
        assert_eq!(cache.head_pose(), pose);
    }

    #[test]
    fn test_initializing_keeps_previous_pose() {
        let backend = VirtualTrackingBackend::new();
        let pose = Pose::new(Vec3::new(1.0, 1.6, 0.0), glam::Quat::IDENTITY);
        backend.set_pose(pose, 2_000, LostTrackingReason::None);

        let mut cache = PoseCache::new();
        cache.pre_update(&backend);

        backend.set_pose(Pose::IDENTITY, 3_000, LostTrackingReason::Initializing);
        cache.pre_update(&backend);

        // Pose and timestamp frozen, reason visible.
        assert_eq!(cache.head_pose(), pose);
        assert_eq!(cache.timestamp_ns(), 2_000);
        assert_eq!(cache.lost_reason(), LostTrackingReason::Initializing);
    }

    #[test]
    fn test_fetch_failure_clears_ready() {
        let backend = VirtualTrackingBackend::new();
        backend.set_pose_available(false);

        let mut cache = PoseCache::new();
        assert!(!cache.pre_update(&backend));
        assert!(!cache.is_ready());
    }

    #[test]
    fn test_reset_zeroes_pose_and_timestamp() {
        let backend = VirtualTrackingBackend::new();
        backend.set_pose(
            Pose::new(Vec3::ONE, glam::Quat::IDENTITY),
            5_000,
            LostTrackingReason::None,
        );
        let mut cache = PoseCache::new();
        cache.pre_update(&backend);

        cache.reset();
        assert_eq!(cache.head_pose(), Pose::IDENTITY);
        assert_eq!(cache.timestamp_ns(), 0);
    }
}

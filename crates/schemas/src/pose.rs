//! Pose types produced by the tracking backend.
//!
//! Convention: right-handed coordinates, +Y up, forward along -Z. All
//! orientations are unit quaternions; constructors renormalize so that the
//! invariant holds everywhere downstream.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tracking::LostTrackingReason;

/// Tolerance for treating a quaternion as already normalized.
const UNIT_EPSILON: f32 = 1e-4;

/// A rigid head pose: position plus orientation.
///
/// Orientation is always a unit quaternion. Use [`Pose::new`] to build a pose
/// from possibly unnormalized input; [`Pose::from_raw`] skips the
/// renormalization and is intended for constants and trusted callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in meters.
    pub position: Vec3,
    /// Orientation as a unit quaternion.
    pub rotation: Quat,
}

impl Pose {
    /// The identity pose: origin position, identity orientation.
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Create a pose, renormalizing the orientation.
    #[must_use]
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation: rotation.normalize(),
        }
    }

    /// Create a pose without renormalizing.
    ///
    /// The caller is responsible for the unit-quaternion invariant.
    #[must_use]
    pub const fn from_raw(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Decompose a rigid transform matrix into a pose.
    ///
    /// Any scale component is discarded and the recovered orientation is
    /// renormalized, so repeated matrix round-trips cannot accumulate drift.
    #[must_use]
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (_, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            position: translation,
            rotation: rotation.normalize(),
        }
    }

    /// The rigid transform matrix for this pose.
    #[must_use]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    /// Forward direction (-Z rotated by the orientation).
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Up direction (+Y rotated by the orientation).
    #[must_use]
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Right direction (+X rotated by the orientation).
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Whether the orientation is a unit quaternion within tolerance.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        (self.rotation.length_squared() - 1.0).abs() < UNIT_EPSILON
    }

    /// This pose with the orientation renormalized.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            position: self.position,
            rotation: self.rotation.normalize(),
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y, z) = (self.position.x, self.position.y, self.position.z);
        let r = self.rotation;
        write!(
            f,
            "pos=({x:.4}, {y:.4}, {z:.4}) rot=({:.4}, {:.4}, {:.4}, {:.4})",
            r.x, r.y, r.z, r.w
        )
    }
}

/// A pose stamped with the hardware clock and the backend's tracking health.
///
/// Overwritten every frame by the pre-update hook; never retroactively
/// mutated. Timestamps are monotonically non-decreasing hardware nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimestampedPose {
    /// The head pose in raw device space.
    pub pose: Pose,
    /// Hardware timestamp in nanoseconds.
    pub timestamp_ns: u64,
    /// Why tracking is degraded, if it is.
    pub lost_reason: LostTrackingReason,
}

impl TimestampedPose {
    /// An identity pose at timestamp zero, reported as still initializing.
    pub const INITIAL: TimestampedPose = TimestampedPose {
        pose: Pose::IDENTITY,
        timestamp_ns: 0,
        lost_reason: LostTrackingReason::Initializing,
    };

    /// Create a timestamped pose with healthy tracking.
    #[must_use]
    pub fn tracked(pose: Pose, timestamp_ns: u64) -> Self {
        Self {
            pose,
            timestamp_ns,
            lost_reason: LostTrackingReason::None,
        }
    }

    /// Whether the backend reports healthy tracking for this sample.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.lost_reason == LostTrackingReason::None
    }
}

impl Default for TimestampedPose {
    fn default() -> Self {
        Self::INITIAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_identity_pose_directions() {
        let pose = Pose::IDENTITY;
        assert!((pose.forward() - Vec3::NEG_Z).length() < 1e-6);
        assert!((pose.up() - Vec3::Y).length() < 1e-6);
        assert!((pose.right() - Vec3::X).length() < 1e-6);
    }

    #[test]
    fn test_new_renormalizes_rotation() {
        let skewed = Quat::from_xyzw(0.0, 2.0, 0.0, 0.0);
        let pose = Pose::new(Vec3::ZERO, skewed);
        assert!(pose.is_normalized());
    }

    #[test]
    fn test_yaw_rotates_forward() {
        // 90 degrees of yaw turns -Z forward into -X.
        let pose = Pose::new(Vec3::ZERO, Quat::from_rotation_y(FRAC_PI_2));
        assert!((pose.forward() - Vec3::NEG_X).length() < 1e-5);
    }

    #[test]
    fn test_matrix_round_trip() {
        let pose = Pose::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_euler(glam::EulerRot::YXZ, 0.7, 0.2, -0.1),
        );
        let back = Pose::from_matrix(&pose.to_matrix());
        assert!((back.position - pose.position).length() < 1e-5);
        // Quaternion sign is not canonical after decomposition.
        assert!(back.rotation.dot(pose.rotation).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn test_timestamped_pose_tracking_state() {
        assert!(!TimestampedPose::INITIAL.is_tracking());
        let sample = TimestampedPose::tracked(Pose::IDENTITY, 42);
        assert!(sample.is_tracking());
        assert_eq!(sample.timestamp_ns, 42);
    }

    #[test]
    fn test_pose_serde_round_trip() {
        let pose = Pose::new(Vec3::new(0.1, 1.5, -0.3), Quat::from_rotation_y(0.5));
        let json = serde_json::to_string(&pose).unwrap();
        let back: Pose = serde_json::from_str(&json).unwrap();
        assert_eq!(pose, back);
    }
}

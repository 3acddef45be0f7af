//! World pose calibration.
//!
//! The calibration holds the rigid transform from raw device tracking space
//! to the application's chosen world origin. It is recomputed only at
//! explicit points (successful mode change, pause, explicit reset) and is
//! read every frame by [`apply`], so writers replace it wholesale and the
//! rotation is renormalized on every recompute and composition to keep the
//! cached transform orthonormal over long sessions.
//!
//! [`apply`]: WorldCalibration::apply

use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};
use tracing::debug;
use visor_schemas::Pose;

/// Threshold below which a projected forward vector is considered degenerate
/// (the user is looking straight up or down).
const DEGENERATE_FORWARD_EPSILON: f32 = 1e-6;

/// Cached mapping from raw device space to application world space.
#[derive(Debug, Clone)]
pub struct WorldCalibration {
    matrix: Mat4,
    pitch_deg: f32,
}

impl Default for WorldCalibration {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldCalibration {
    /// Identity calibration: raw device space is world space.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            matrix: Mat4::IDENTITY,
            pitch_deg: 0.0,
        }
    }

    /// The cached world matrix.
    #[must_use]
    pub const fn matrix(&self) -> Mat4 {
        self.matrix
    }

    /// The pitch adjustment captured by the last reset, in degrees.
    #[must_use]
    pub const fn cached_pitch_deg(&self) -> f32 {
        self.pitch_deg
    }

    /// Whether the calibration is the identity mapping.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.matrix == Mat4::IDENTITY
    }

    /// The world-space pose the calibration is anchored at.
    #[must_use]
    pub fn anchor_pose(&self) -> Pose {
        Pose::from_matrix(&self.matrix)
    }

    /// Re-cache the world matrix from a reference pose.
    ///
    /// The reference orientation is flattened to a gravity-aligned yaw-only
    /// rotation (forward projected on the horizontal plane), so the new
    /// origin keeps the reference heading and position but is level. The
    /// pitch adjustment resets to zero.
    pub fn cache_from_pose(&mut self, pose: &Pose) {
        let rotation = gravity_aligned_yaw(pose.forward());
        self.matrix = Mat4::from_rotation_translation(rotation, pose.position);
        self.pitch_deg = 0.0;
        debug!(pose = %pose, "cached world matrix");
    }

    /// Reset the world origin so the current live pose becomes the zero
    /// reference.
    ///
    /// `live` is the pose as currently seen through this calibration; its
    /// raw equivalent is recovered via the inverse of the cached matrix so
    /// that repeated resets do not compound.
    ///
    /// With `reset_pitch == false` only yaw is neutralized: the head's pitch
    /// and roll still read through. With `reset_pitch == true` yaw and pitch
    /// are both neutralized, using the cross-product basis construction
    /// (forward x world-up -> right, right x forward -> up) to avoid gimbal
    /// artifacts near the poles.
    pub fn reset_from_live_pose(&mut self, live: &Pose, reset_pitch: bool) {
        let raw_matrix = self.matrix.inverse() * live.to_matrix();
        let raw = Pose::from_matrix(&raw_matrix);

        let rotation = if reset_pitch {
            look_rotation_tilted(raw.forward())
        } else {
            gravity_aligned_yaw(raw.forward())
        };

        let reference = Mat4::from_rotation_translation(rotation, raw.position);
        self.matrix = reference.inverse();

        let (_, pitch_rad, _) = rotation.to_euler(EulerRot::YXZ);
        self.pitch_deg = pitch_rad.to_degrees();

        debug!(
            reset_pitch,
            live = %live,
            raw = %raw,
            pitch_deg = self.pitch_deg,
            "reset world matrix"
        );
    }

    /// Transform a raw device-space pose into application world space.
    ///
    /// Pure function of the cached matrix; called at full frame rate. The
    /// resulting orientation is renormalized so floating-point drift cannot
    /// accumulate through the indefinitely cached matrix.
    #[must_use]
    pub fn apply(&self, pose: &Pose) -> Pose {
        let composed = self.matrix * pose.to_matrix();
        Pose::from_matrix(&composed)
    }
}

/// Project a forward vector onto the horizontal plane and normalize.
///
/// Falls back to -Z when the vector is (near) vertical.
fn horizontal_forward(forward: Vec3) -> Vec3 {
    let flat = Vec3::new(forward.x, 0.0, forward.z);
    if flat.length_squared() < DEGENERATE_FORWARD_EPSILON {
        Vec3::NEG_Z
    } else {
        flat.normalize()
    }
}

/// Yaw-only rotation facing the horizontal projection of `forward`.
fn gravity_aligned_yaw(forward: Vec3) -> Quat {
    look_rotation(horizontal_forward(forward), Vec3::Y)
}

/// Rotation facing `forward` with an up vector rebuilt by cross products,
/// so yaw and pitch are captured but roll is discarded.
fn look_rotation_tilted(forward: Vec3) -> Quat {
    let f = forward.try_normalize().unwrap_or(Vec3::NEG_Z);
    let right = f.cross(Vec3::Y);
    let right = right.try_normalize().unwrap_or(Vec3::X);
    let up = right.cross(f).normalize();
    look_rotation(f, up)
}

/// Rotation whose forward (-Z) axis points along `forward` with the given up.
///
/// `forward` and `up` must be normalized and not parallel.
fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let z_axis = -forward;
    let x_axis = up.cross(z_axis).normalize();
    let y_axis = z_axis.cross(x_axis);
    Quat::from_mat3(&Mat3::from_cols(x_axis, y_axis, z_axis)).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::EulerRot;

    fn pose_from_euler(roll_deg: f32, pitch_deg: f32, yaw_deg: f32, position: Vec3) -> Pose {
        let rotation = Quat::from_euler(
            EulerRot::YXZ,
            yaw_deg.to_radians(),
            pitch_deg.to_radians(),
            roll_deg.to_radians(),
        );
        Pose::new(position, rotation)
    }

    fn euler_deg(rotation: Quat) -> (f32, f32, f32) {
        let (yaw, pitch, roll) = rotation.to_euler(EulerRot::YXZ);
        (roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees())
    }

    #[test]
    fn test_identity_apply_is_identity() {
        let calibration = WorldCalibration::new();
        let pose = pose_from_euler(5.0, -10.0, 33.0, Vec3::new(0.5, 1.6, -2.0));
        let out = calibration.apply(&pose);
        assert!((out.position - pose.position).length() < 1e-5);
        assert!(out.rotation.dot(pose.rotation).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn test_cache_from_pose_is_yaw_only() {
        let mut calibration = WorldCalibration::new();
        let pose = pose_from_euler(12.0, 7.0, 40.0, Vec3::new(1.0, 1.5, 0.2));
        calibration.cache_from_pose(&pose);

        let anchor = calibration.anchor_pose();
        let (roll, pitch, yaw) = euler_deg(anchor.rotation);
        assert!(roll.abs() < 1e-3);
        assert!(pitch.abs() < 1e-3);
        assert!((yaw - 40.0).abs() < 1e-2);
        assert!((anchor.position - pose.position).length() < 1e-5);
        assert!((calibration.cached_pitch_deg()).abs() < f32::EPSILON);
    }

    #[test]
    fn test_reset_without_pitch_neutralizes_yaw_only() {
        let mut calibration = WorldCalibration::new();
        let live = pose_from_euler(12.0, 7.0, 40.0, Vec3::new(0.3, 1.4, -0.8));
        calibration.reset_from_live_pose(&live, false);

        // Seen through the new calibration, the same device pose should keep
        // its pitch and roll but read zero yaw and zero position.
        let out = calibration.apply(&live);
        let (roll, pitch, yaw) = euler_deg(out.rotation);
        assert!((roll - 12.0).abs() < 1e-2, "roll preserved, got {roll}");
        assert!((pitch - 7.0).abs() < 1e-2, "pitch preserved, got {pitch}");
        assert!(yaw.abs() < 1e-2, "yaw neutralized, got {yaw}");
        assert!(out.position.length() < 1e-4);
        assert!(calibration.cached_pitch_deg().abs() < 1e-3);
    }

    #[test]
    fn test_reset_with_pitch_neutralizes_yaw_and_pitch() {
        let mut calibration = WorldCalibration::new();
        let live = pose_from_euler(0.0, 7.0, 40.0, Vec3::new(0.0, 1.2, 0.0));
        calibration.reset_from_live_pose(&live, true);

        let out = calibration.apply(&live);
        let (_, pitch, yaw) = euler_deg(out.rotation);
        assert!(pitch.abs() < 1e-2, "pitch neutralized, got {pitch}");
        assert!(yaw.abs() < 1e-2, "yaw neutralized, got {yaw}");
        assert!((calibration.cached_pitch_deg() - 7.0).abs() < 1e-2);
    }

    #[test]
    fn test_reset_is_idempotent_for_matching_pose() {
        let mut calibration = WorldCalibration::new();
        let live = pose_from_euler(0.0, 0.0, 25.0, Vec3::new(0.1, 1.5, 0.4));
        calibration.reset_from_live_pose(&live, false);
        let first = calibration.matrix();

        // The pose as now seen through the calibration is the zero reference;
        // resetting again against it must not move the origin.
        let seen = calibration.apply(&live);
        calibration.reset_from_live_pose(&seen, false);
        let second = calibration.matrix();

        assert!(first.abs_diff_eq(second, 1e-4));
    }

    #[test]
    fn test_repeated_apply_stays_orthonormal() {
        let mut calibration = WorldCalibration::new();
        calibration.cache_from_pose(&pose_from_euler(3.0, -4.0, 121.0, Vec3::splat(0.7)));

        let mut pose = pose_from_euler(1.0, 2.0, 3.0, Vec3::new(0.0, 1.6, 0.0));
        for _ in 0..10_000 {
            pose = calibration.apply(&pose);
            pose.position = Vec3::new(0.0, 1.6, 0.0);
        }
        assert!(pose.is_normalized());
    }

    #[test]
    fn test_degenerate_forward_falls_back() {
        // Looking straight down: the horizontal projection vanishes.
        let down = Pose::new(Vec3::ZERO, Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2));
        let mut calibration = WorldCalibration::new();
        calibration.cache_from_pose(&down);
        assert!(calibration.anchor_pose().rotation.is_finite());
    }
}

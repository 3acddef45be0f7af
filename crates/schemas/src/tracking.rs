//! Tracking-mode vocabulary: degrees of freedom, backend capabilities, and
//! the lost-tracking taxonomy reported by the perception stack.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Degrees of freedom tracked by the HMD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackingMode {
    /// Track position and rotation.
    SixDof,
    /// Track rotation only.
    ThreeDof,
    /// Track nothing; the head pose is static.
    ZeroDof,
    /// Track nothing, but keep rotation to smooth the static pose.
    ZeroDofStable,
}

impl TrackingMode {
    /// Whether this mode tracks head position.
    #[must_use]
    pub const fn is_positional(self) -> bool {
        matches!(self, TrackingMode::SixDof)
    }

    /// Whether this mode consumes rotational tracking from the backend.
    #[must_use]
    pub const fn is_rotational(self) -> bool {
        matches!(
            self,
            TrackingMode::SixDof | TrackingMode::ThreeDof | TrackingMode::ZeroDofStable
        )
    }

    /// The backend capability this mode needs, if any.
    ///
    /// `ZeroDof` needs nothing and is the unconditional fallback target.
    #[must_use]
    pub const fn required_capability(self) -> Option<Capability> {
        match self {
            TrackingMode::SixDof => Some(Capability::PositionTracking),
            TrackingMode::ThreeDof | TrackingMode::ZeroDofStable => {
                Some(Capability::RotationTracking)
            }
            TrackingMode::ZeroDof => None,
        }
    }
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingMode::SixDof => write!(f, "6dof"),
            TrackingMode::ThreeDof => write!(f, "3dof"),
            TrackingMode::ZeroDof => write!(f, "0dof"),
            TrackingMode::ZeroDofStable => write!(f, "0dof-stable"),
        }
    }
}

/// Perception features a tracking backend may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Head rotation tracking.
    RotationTracking,
    /// Head position tracking.
    PositionTracking,
}

/// Backend-reported reason why pose tracking is currently degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum LostTrackingReason {
    /// The perception stack has not started yet.
    PreInitializing = -1,
    /// Tracking is healthy.
    None = 0,
    /// The perception stack is initializing.
    Initializing = 1,
    /// The device is moving too fast to track.
    ExcessiveMotion = 2,
    /// Not enough visual features in view.
    InsufficientFeatures = 3,
    /// Relocalizing against a previously built map.
    Relocalizing = 4,
    /// Tracking suspended while entering VR mode.
    EnterVrMode = 5,
}

impl LostTrackingReason {
    /// The backend wire code for this reason.
    #[must_use]
    pub const fn code(self) -> i8 {
        self as i8
    }

    /// Decode a backend wire code. Returns `None` for unknown codes.
    #[must_use]
    pub const fn from_code(code: i8) -> Option<Self> {
        match code {
            -1 => Some(LostTrackingReason::PreInitializing),
            0 => Some(LostTrackingReason::None),
            1 => Some(LostTrackingReason::Initializing),
            2 => Some(LostTrackingReason::ExcessiveMotion),
            3 => Some(LostTrackingReason::InsufficientFeatures),
            4 => Some(LostTrackingReason::Relocalizing),
            5 => Some(LostTrackingReason::EnterVrMode),
            _ => None,
        }
    }
}

impl fmt::Display for LostTrackingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LostTrackingReason::PreInitializing => write!(f, "pre-initializing"),
            LostTrackingReason::None => write!(f, "none"),
            LostTrackingReason::Initializing => write!(f, "initializing"),
            LostTrackingReason::ExcessiveMotion => write!(f, "excessive motion"),
            LostTrackingReason::InsufficientFeatures => write!(f, "insufficient features"),
            LostTrackingReason::Relocalizing => write!(f, "relocalizing"),
            LostTrackingReason::EnterVrMode => write!(f, "entering VR mode"),
        }
    }
}

/// Outcome of a tracking-mode change request.
///
/// `mode` is the mode actually in effect after the request settles; on a
/// failed or rejected request it is the unchanged current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingModeChangedResult {
    /// Whether the backend switch succeeded.
    pub success: bool,
    /// The tracking mode in effect after the request.
    pub mode: TrackingMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_capability_requirements() {
        assert_eq!(
            TrackingMode::SixDof.required_capability(),
            Some(Capability::PositionTracking)
        );
        assert_eq!(
            TrackingMode::ThreeDof.required_capability(),
            Some(Capability::RotationTracking)
        );
        assert_eq!(
            TrackingMode::ZeroDofStable.required_capability(),
            Some(Capability::RotationTracking)
        );
        assert_eq!(TrackingMode::ZeroDof.required_capability(), None);
    }

    #[test]
    fn test_mode_dof_classification() {
        assert!(TrackingMode::SixDof.is_positional());
        assert!(!TrackingMode::ThreeDof.is_positional());
        assert!(TrackingMode::ZeroDofStable.is_rotational());
        assert!(!TrackingMode::ZeroDof.is_rotational());
    }

    #[test]
    fn test_lost_reason_code_round_trip() {
        for reason in [
            LostTrackingReason::PreInitializing,
            LostTrackingReason::None,
            LostTrackingReason::Initializing,
            LostTrackingReason::ExcessiveMotion,
            LostTrackingReason::InsufficientFeatures,
            LostTrackingReason::Relocalizing,
            LostTrackingReason::EnterVrMode,
        ] {
            assert_eq!(LostTrackingReason::from_code(reason.code()), Some(reason));
        }
        assert_eq!(LostTrackingReason::from_code(42), None);
    }
}

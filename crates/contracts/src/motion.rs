//! Body model - segments, joints and the pipeline's output frame.
//!
//! The skeletal topology is a fixed table: each joint names its parent and
//! child segment; there are no back-pointers and no dynamic graph.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::{Quat, SyncMeta};

/// Tracked body segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Pelvis,
    ThighLeft,
    ThighRight,
    TibiaLeft,
    TibiaRight,
    FootLeft,
    FootRight,
    Head,
}

impl Segment {
    pub const ALL: [Segment; 8] = [
        Segment::Pelvis,
        Segment::ThighLeft,
        Segment::ThighRight,
        Segment::TibiaLeft,
        Segment::TibiaRight,
        Segment::FootLeft,
        Segment::FootRight,
        Segment::Head,
    ];

    /// Segments calibrated with the two-layer (PCA + boresight) construction
    /// instead of a known target pose.
    pub fn uses_two_layer_calibration(&self) -> bool {
        matches!(self, Segment::Head)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Segment::Pelvis => "pelvis",
            Segment::ThighLeft => "thigh_left",
            Segment::ThighRight => "thigh_right",
            Segment::TibiaLeft => "tibia_left",
            Segment::TibiaRight => "tibia_right",
            Segment::FootLeft => "foot_left",
            Segment::FootRight => "foot_right",
            Segment::Head => "head",
        };
        write!(f, "{s}")
    }
}

/// Euler decomposition order for `q_rel = q_parent⁻¹ · q_child`.
///
/// The letters name the intrinsic rotation sequence; the axis roles are fixed
/// (X = flexion, Z = abduction, Y = axial rotation) regardless of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EulerOrder {
    Xyz,
    Xzy,
    Zxy,
    Yxz,
}

/// Anatomical joints between tracked segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    HipLeft,
    HipRight,
    KneeLeft,
    KneeRight,
    AnkleLeft,
    AnkleRight,
    Neck,
}

impl Joint {
    pub const ALL: [Joint; 7] = [
        Joint::HipLeft,
        Joint::HipRight,
        Joint::KneeLeft,
        Joint::KneeRight,
        Joint::AnkleLeft,
        Joint::AnkleRight,
        Joint::Neck,
    ];

    /// (parent, child) segments spanning this joint.
    pub fn segments(&self) -> (Segment, Segment) {
        match self {
            Joint::HipLeft => (Segment::Pelvis, Segment::ThighLeft),
            Joint::HipRight => (Segment::Pelvis, Segment::ThighRight),
            Joint::KneeLeft => (Segment::ThighLeft, Segment::TibiaLeft),
            Joint::KneeRight => (Segment::ThighRight, Segment::TibiaRight),
            Joint::AnkleLeft => (Segment::TibiaLeft, Segment::FootLeft),
            Joint::AnkleRight => (Segment::TibiaRight, Segment::FootRight),
            Joint::Neck => (Segment::Pelvis, Segment::Head),
        }
    }

    /// Decomposition order per joint.
    ///
    /// Knee and hip use XZY so flexion stays on the atan2-extracted axis and
    /// keeps its full range (deep knee/hip flexion passes 90°); the
    /// asin-bounded middle angle lands on abduction, which is anatomically
    /// confined well inside ±90°. Ankle and neck use ZXY as tabled.
    pub fn euler_order(&self) -> EulerOrder {
        match self {
            Joint::HipLeft | Joint::HipRight => EulerOrder::Xzy,
            Joint::KneeLeft | Joint::KneeRight => EulerOrder::Xzy,
            Joint::AnkleLeft | Joint::AnkleRight => EulerOrder::Zxy,
            Joint::Neck => EulerOrder::Zxy,
        }
    }

    /// Physiologic range per joint (degrees). Checked, never clamped.
    pub fn physiologic_range(&self) -> JointRange {
        match self {
            Joint::HipLeft | Joint::HipRight => JointRange {
                flexion: (-30.0, 140.0),
                abduction: (-50.0, 50.0),
                rotation: (-60.0, 60.0),
            },
            Joint::KneeLeft | Joint::KneeRight => JointRange {
                flexion: (-10.0, 160.0),
                abduction: (-20.0, 20.0),
                rotation: (-35.0, 35.0),
            },
            Joint::AnkleLeft | Joint::AnkleRight => JointRange {
                flexion: (-50.0, 30.0),
                abduction: (-30.0, 30.0),
                rotation: (-25.0, 25.0),
            },
            Joint::Neck => JointRange {
                flexion: (-60.0, 70.0),
                abduction: (-45.0, 45.0),
                rotation: (-80.0, 80.0),
            },
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Joint::HipLeft => "hip_left",
            Joint::HipRight => "hip_right",
            Joint::KneeLeft => "knee_left",
            Joint::KneeRight => "knee_right",
            Joint::AnkleLeft => "ankle_left",
            Joint::AnkleRight => "ankle_right",
            Joint::Neck => "neck",
        };
        write!(f, "{s}")
    }
}

/// Min/max bounds per clinical angle (degrees).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JointRange {
    pub flexion: (f64, f64),
    pub abduction: (f64, f64),
    pub rotation: (f64, f64),
}

/// Clinical joint angles (degrees).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JointAngles {
    pub flexion: f64,
    pub abduction: f64,
    pub rotation: f64,
}

impl JointAngles {
    pub const fn new(flexion: f64, abduction: f64, rotation: f64) -> Self {
        Self {
            flexion,
            abduction,
            rotation,
        }
    }

    /// True when all three angles fall inside the given range.
    pub fn within(&self, range: &JointRange) -> bool {
        let inside = |v: f64, (lo, hi): (f64, f64)| v >= lo && v <= hi;
        inside(self.flexion, range.flexion)
            && inside(self.abduction, range.abduction)
            && inside(self.rotation, range.rotation)
    }
}

/// One segment's fused, tared world orientation plus filter status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SegmentPose {
    /// Bone orientation in the (heading-tared) world frame, w >= 0
    pub quat_world: Quat,

    /// Filter believed the sensor was at rest this tick
    pub rest: bool,

    /// Accelerometer magnitude deviated too far from gravity; tilt
    /// correction was skipped
    pub external_accel: bool,

    /// Magnetic field failed the disturbance checks; heading correction was
    /// skipped or down-weighted
    pub mag_disturbed: bool,

    /// Current heading uncertainty (degrees, 5..=180)
    pub heading_uncertainty_deg: f64,

    /// Input contained a non-finite field; the pose is the identity
    pub invalid_input: bool,
}

/// One joint's decomposed angles plus the physiologic-range check outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JointSample {
    pub angles: JointAngles,

    /// False when any angle left its declared physiologic range (reported,
    /// never clamped)
    pub within_physiologic_range: bool,
}

/// The pipeline's per-tick output: calibrated bone poses and joint angles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionFrame {
    pub frame_number: u32,
    pub timestamp_us: u32,
    pub segments: HashMap<Segment, SegmentPose>,
    pub joints: HashMap<Joint, JointSample>,
    pub meta: SyncMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_topology_is_consistent() {
        for joint in Joint::ALL {
            let (parent, child) = joint.segments();
            assert_ne!(parent, child, "{joint} links a segment to itself");
        }
    }

    #[test]
    fn test_flexion_range_contains_neutral() {
        for joint in Joint::ALL {
            let range = joint.physiologic_range();
            assert!(JointAngles::default().within(&range), "{joint} excludes neutral");
        }
    }

    #[test]
    fn test_range_check_reports_violation() {
        let range = Joint::KneeLeft.physiologic_range();
        let hyperextended = JointAngles::new(-40.0, 0.0, 0.0);
        assert!(!hyperextended.within(&range));
    }

    #[test]
    fn test_segment_serde_names() {
        let json = serde_json::to_string(&Segment::ThighLeft).unwrap();
        assert_eq!(json, "\"thigh_left\"");
    }
}

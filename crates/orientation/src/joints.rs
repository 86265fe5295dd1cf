//! Joint-angle decomposition.

use contracts::{Joint, JointAngles, JointSample, Quat};
use nalgebra::UnitQuaternion;
use tracing::warn;

use crate::convert::to_quat;
use crate::euler::decompose;

/// Decompose a parent/child pose pair into clinical joint angles.
///
/// `q_rel = q_parent⁻¹ · q_child`, decomposed in the joint's declared Euler
/// order, converted to degrees, with the joint tare subtracted. Angles
/// outside the physiologic range are reported, never clamped.
pub fn decompose_joint(
    joint: Joint,
    parent_world: Quat,
    child_world: Quat,
    joint_tare: JointAngles,
) -> JointSample {
    let parent = to_quat(parent_world);
    let child = to_quat(child_world);
    let relative: UnitQuaternion<f64> = parent.inverse() * child;

    let (flexion, abduction, rotation) = decompose(&relative, joint.euler_order());

    let angles = JointAngles {
        flexion: flexion - joint_tare.flexion,
        abduction: abduction - joint_tare.abduction,
        rotation: rotation - joint_tare.rotation,
    };

    let within = angles.within(&joint.physiologic_range());
    if !within {
        warn!(
            joint = %joint,
            flexion = angles.flexion,
            abduction = angles.abduction,
            rotation = angles.rotation,
            "joint angles outside physiologic range"
        );
        metrics::counter!("mocap_joint_range_violations_total", "joint" => joint.to_string())
            .increment(1);
    }

    JointSample {
        angles,
        within_physiologic_range: within,
    }
}

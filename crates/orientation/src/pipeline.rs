//! Tare pipeline: sensor quaternion → bone-frame world quaternion.
//!
//! Two mounting constructions exist as explicit variants:
//!
//! - **Single-pose** (body segments): the tare is a fixed offset
//!   right-multiplied in the sensor's local frame,
//!   `q_bone = q_sensor · mounting_tare` with
//!   `mounting_tare = q_cal⁻¹ · q_target`. The world-frame
//!   `mounting_tare · q_sensor` form is wrong (it swaps axes under non-flat
//!   tare poses) and a regression test pins that down.
//! - **Two-layer** (head/cervical): no world target pose exists, so the
//!   sensor-local delta from the start pose is mapped through the
//!   PCA-derived axis alignment:
//!   `q_bone = R · (q_start⁻¹ · q_sensor) · R⁻¹`. At the start pose this is
//!   the identity and cued motions land on their anatomical axes no matter
//!   how the sensor is mounted or how the segment was oriented at capture.
//!
//! Heading tare is a yaw-only left-applied inverse on either construction.

use contracts::{PipelineError, Quat, TareEntry};
use nalgebra::{UnitQuaternion, Vector3};
use tracing::debug;

use crate::convert::{quat_to_contract, to_quat};
use crate::spherical::{spherical_mean, stillness_score, stillness_variance};

/// Minimum stillness score for a multi-sample mounting capture.
const MIN_STILLNESS_SCORE: f64 = 0.3;

/// Horizontal length under which the forward vector is unusable for the
/// heading tare and the right vector substitutes.
const MIN_HORIZONTAL_FORWARD: f64 = 0.01;

/// A fully tared pose.
#[derive(Debug, Clone, Copy)]
pub struct TaredPose {
    /// Bone orientation in the heading-tared world frame, w >= 0
    pub quat_world: Quat,

    /// False when the input was non-finite and the identity was substituted
    pub valid: bool,
}

/// Applies a segment's tare entry to fused sensor quaternions.
///
/// Read-only over the entry; capture operations mutate entries elsewhere and
/// are serialized with frame updates by the session.
#[derive(Debug, Default)]
pub struct TarePipeline;

impl TarePipeline {
    /// Run the full layer stack for one segment.
    pub fn apply(entry: &TareEntry, sensor: Quat) -> TaredPose {
        if !sensor.is_finite() {
            return TaredPose {
                quat_world: Quat::IDENTITY,
                valid: false,
            };
        }

        let q_sensor = to_quat(sensor);
        let mounting = to_quat(entry.mounting_tare);

        let q_bone = match entry.frame_alignment {
            // Two-layer: axis-map similarity of the sensor-local delta.
            // `mounting_tare` holds q_start⁻¹ for these segments.
            Some(alignment) => {
                let align = to_quat(alignment);
                align * (mounting * q_sensor) * align.inverse()
            }
            // Single-pose: offset expressed in the sensor's local frame,
            // always right-multiplied.
            None => q_sensor * mounting,
        };

        let heading = to_quat(entry.heading_tare);
        let q_world = heading.inverse() * q_bone;

        TaredPose {
            quat_world: quat_to_contract(&q_world),
            valid: true,
        }
    }
}

/// Single-pose mounting tare: `mounting_tare = q_cal⁻¹ · q_target`.
///
/// At the calibration pose the tared output equals the target (bind-pose)
/// orientation; later sensor-local deltas appear in the bone's local frame.
pub fn capture_mounting_single(sensor_at_pose: Quat, target: Quat) -> Quat {
    let cal = to_quat(sensor_at_pose);
    let target = to_quat(target);
    quat_to_contract(&(cal.inverse() * target))
}

/// Robust variant over a short still window: samples are averaged with the
/// spherical mean and the capture is refused when the window was not still.
pub fn capture_mounting_robust(
    samples: &[Quat],
    target: Quat,
) -> Result<Quat, PipelineError> {
    let quats: Vec<UnitQuaternion<f64>> = samples
        .iter()
        .filter(|q| q.is_finite())
        .map(|q| to_quat(*q))
        .collect();

    let mean = spherical_mean(&quats).ok_or_else(|| {
        PipelineError::calibration_invalid("mounting", "no finite samples in capture window")
    })?;

    let variance = stillness_variance(&quats, &mean);
    let score = stillness_score(variance);
    debug!(variance, score, samples = quats.len(), "mounting capture stillness");
    if score < MIN_STILLNESS_SCORE {
        return Err(PipelineError::calibration_invalid(
            "mounting",
            format!("segment was moving during capture (stillness {score:.2})"),
        ));
    }

    Ok(capture_mounting_single(quat_to_contract(&mean), target))
}

/// Two-layer mounting capture for segments without a known target pose.
///
/// Returns `(mounting_tare, frame_alignment)` = `(q_start⁻¹, R)` to store on
/// the entry; the pipeline composes them as `R · q_start⁻¹ · q_sensor · R⁻¹`.
pub fn capture_mounting_two_layer(
    sensor_at_start: Quat,
    axis_alignment: UnitQuaternion<f64>,
) -> (Quat, Quat) {
    let start = to_quat(sensor_at_start);
    (
        quat_to_contract(&start.inverse()),
        quat_to_contract(&axis_alignment),
    )
}

/// Yaw extraction for the heading tare.
///
/// Projects the bone's forward (+Z) into the horizontal plane, substituting
/// the bone's right (+X) when forward is nearly vertical, and returns the
/// yaw-only quaternion about +Y.
pub fn compute_heading_tare(bone: Quat) -> Quat {
    let q = to_quat(bone);

    let forward = q * Vector3::z();
    let yaw = if (forward.x * forward.x + forward.z * forward.z).sqrt() < MIN_HORIZONTAL_FORWARD {
        // Forward is nearly vertical; the right vector's yaw serves,
        // offset by its -90° lead over forward.
        let right = q * Vector3::x();
        right.x.atan2(right.z) - std::f64::consts::FRAC_PI_2
    } else {
        forward.x.atan2(forward.z)
    };

    if yaw == 0.0 {
        return Quat::IDENTITY;
    }
    quat_to_contract(&UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw))
}

/// Heading tare capture for one segment (level 2).
pub fn capture_heading_tare(bone: Quat) -> Quat {
    compute_heading_tare(bone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TareEntry;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn rx(rad: f64) -> UnitQuaternion<f64> {
        UnitQuaternion::from_axis_angle(&Vector3::x_axis(), rad)
    }
    fn ry(rad: f64) -> UnitQuaternion<f64> {
        UnitQuaternion::from_axis_angle(&Vector3::y_axis(), rad)
    }
    fn rz(rad: f64) -> UnitQuaternion<f64> {
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), rad)
    }
    fn c(q: UnitQuaternion<f64>) -> Quat {
        quat_to_contract(&q)
    }
    fn angle_between(a: Quat, b: UnitQuaternion<f64>) -> f64 {
        (to_quat(a).inverse() * b).angle().to_degrees()
    }

    fn entry_single(mounting: Quat) -> TareEntry {
        TareEntry {
            mounting_tare: mounting,
            mounting_captured_us: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_taring_roundtrip_many_poses() {
        // mounting_tare = q_cal⁻¹ ⇒ q_cal · mounting_tare = identity, for
        // every calibration pose including steep ones.
        let poses = [
            UnitQuaternion::identity(),
            rx(FRAC_PI_2),
            rz(FRAC_PI_2),
            rx(1.0472) * ry(1.0472) * rz(1.0472),
        ];
        for pose in poses {
            let tare = capture_mounting_single(c(pose), Quat::IDENTITY);
            let out = TarePipeline::apply(&entry_single(tare), c(pose));
            let residual = angle_between(out.quat_world, UnitQuaternion::identity());
            assert!(residual < 0.1, "pose {pose:?}: residual {residual}°");
        }
    }

    #[test]
    fn test_local_frame_invariance() {
        // A local delta of magnitude θ must come out with magnitude θ for
        // any calibration pose.
        let poses = [rx(FRAC_PI_2), rz(FRAC_PI_2), rx(0.9) * ry(-0.6)];
        let deltas = [rx(0.3), ry(0.8), rz(-0.5), rx(0.2) * rz(0.4)];
        for pose in poses {
            let tare = capture_mounting_single(c(pose), Quat::IDENTITY);
            let entry = entry_single(tare);
            for delta in deltas {
                let sensor = pose * delta;
                let out = TarePipeline::apply(&entry, c(sensor));
                let out_angle = to_quat(out.quat_world).angle().to_degrees();
                let in_angle = delta.angle().to_degrees();
                assert!(
                    (out_angle - in_angle).abs() < 2.0,
                    "pose {pose:?} delta {in_angle}° came out {out_angle}°"
                );
            }
        }
    }

    #[test]
    fn test_target_pose_becomes_bind_pose() {
        let cal = rx(0.4) * rz(0.2);
        let target = ry(FRAC_PI_4);
        let tare = capture_mounting_single(c(cal), c(target));
        let out = TarePipeline::apply(&entry_single(tare), c(cal));
        assert!(angle_between(out.quat_world, target) < 0.1);
    }

    #[test]
    fn test_right_multiplication_not_world_frame() {
        // Regression guard: with a non-flat calibration pose, the wrong
        // world-frame form `mounting_tare · q_sensor` disagrees with the
        // sensor-local form by a large angle.
        let pose = rx(FRAC_PI_2);
        let delta = ry(0.6);
        let sensor = pose * delta;
        let tare = capture_mounting_single(c(pose), Quat::IDENTITY);

        let right = to_quat(c(sensor)) * to_quat(tare);
        let wrong = to_quat(tare) * to_quat(c(sensor));
        let disagreement = (right.inverse() * wrong).angle().to_degrees();
        assert!(
            disagreement > 10.0,
            "forms must diverge under a 90° tare pose, got {disagreement}°"
        );

        // And the pipeline is the sensor-local one.
        let out = TarePipeline::apply(&entry_single(tare), c(sensor));
        assert!(angle_between(out.quat_world, right) < 1e-6);
    }

    #[test]
    fn test_two_layer_identity_at_start() {
        let start = ry(0.8) * rz(FRAC_PI_2);
        let alignment = rz(FRAC_PI_2);
        let (mounting, frame_alignment) = capture_mounting_two_layer(c(start), alignment);
        let entry = TareEntry {
            mounting_tare: mounting,
            frame_alignment: Some(frame_alignment),
            mounting_captured_us: 1,
            ..Default::default()
        };
        let out = TarePipeline::apply(&entry, c(start));
        assert!(angle_between(out.quat_world, UnitQuaternion::identity()) < 0.1);
    }

    #[test]
    fn test_two_layer_maps_motion_to_anatomical_axis() {
        // Mounting rotated 90° about bone Z, bone yawed 45° at capture.
        // A 45° bone flexion must come out as 45° about X.
        let mount = rz(FRAC_PI_2);
        let bone_start = ry(FRAC_PI_4);
        let start = bone_start * mount;

        // Functional calibration sees the nod axis as -Y in sensor frame;
        // the alignment maps it to +X (i.e. R = Rz(90°)).
        let alignment = rz(FRAC_PI_2);
        let (mounting, frame_alignment) = capture_mounting_two_layer(c(start), alignment);
        let entry = TareEntry {
            mounting_tare: mounting,
            frame_alignment: Some(frame_alignment),
            mounting_captured_us: 1,
            ..Default::default()
        };

        let flexed = bone_start * rx(FRAC_PI_4) * mount;
        let out = TarePipeline::apply(&entry, c(flexed));
        let err = angle_between(out.quat_world, rx(FRAC_PI_4));
        assert!(err < 2.0, "two-layer flexion error {err}°");

        // The boresight-only construction mis-maps the same motion by more
        // than 10°; this assertion prevents a regression to it.
        let single = to_quat(c(flexed)) * to_quat(c(start)).inverse();
        let single_err = (single.inverse() * rx(FRAC_PI_4)).angle().to_degrees();
        assert!(
            single_err > 10.0,
            "single-layer must fail on rotated mounting, got {single_err}°"
        );
    }

    #[test]
    fn test_heading_tare_removes_yaw() {
        let bone = ry(0.7) * rx(0.3);
        let entry = TareEntry {
            heading_tare: compute_heading_tare(c(bone)),
            heading_captured_us: 1,
            ..Default::default()
        };
        let out = TarePipeline::apply(&entry, c(bone));
        // Yaw removed: the forward vector's horizontal direction is +Z.
        let forward = to_quat(out.quat_world) * Vector3::z();
        assert!(forward.x.abs() < 1e-6, "residual yaw: {}", forward.x);
        assert!(forward.z > 0.0);
    }

    #[test]
    fn test_heading_tare_vertical_forward_uses_right() {
        // Forward pointing straight up: fall back to the right vector.
        let bone = ry(0.5) * rx(-FRAC_PI_2);
        let tare = compute_heading_tare(c(bone));
        assert!(to_quat(tare).angle() > 1e-3, "fallback must still find yaw");
    }

    #[test]
    fn test_robust_capture_rejects_motion() {
        let moving: Vec<Quat> = (0..20).map(|i| c(rx(i as f64 * 0.2))).collect();
        assert!(capture_mounting_robust(&moving, Quat::IDENTITY).is_err());

        let still: Vec<Quat> = (0..20).map(|_| c(rx(0.5))).collect();
        let tare = capture_mounting_robust(&still, Quat::IDENTITY).unwrap();
        assert!(angle_between(tare, rx(-0.5)) < 0.1);
    }

    #[test]
    fn test_non_finite_input_yields_identity() {
        let entry = entry_single(Quat::IDENTITY);
        let out = TarePipeline::apply(&entry, Quat::new(f64::NAN, 0.0, 0.0, 0.0));
        assert!(!out.valid);
        assert_eq!(out.quat_world, Quat::IDENTITY);
    }
}

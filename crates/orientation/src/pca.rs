//! Functional-axis estimation from cued motion.
//!
//! A cued motion (head nod, head shake, knee flexion) concentrates the gyro
//! energy on one sensor-frame axis. PCA over a low-passed gyro window
//! recovers that axis; Gram-Schmidt against gravity completes an anatomical
//! basis and the axis-alignment rotation.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use tracing::warn;

use crate::sta::StaFilter;

/// Confidence below this is reported as a warning-grade estimate.
const LOW_CONFIDENCE: f64 = 0.5;

/// Result of a functional-axis estimation.
#[derive(Debug, Clone, Copy)]
pub struct AxisEstimate {
    /// Dominant rotation axis in the sensor frame (unit)
    pub axis: Vector3<f64>,

    /// λ₁ / (λ₁+λ₂+λ₃) in [0, 1]; < 0.5 means the motion was not planar
    /// enough
    pub confidence: f64,
}

impl AxisEstimate {
    pub fn is_confident(&self) -> bool {
        self.confidence >= LOW_CONFIDENCE
    }
}

/// Estimate the dominant rotation axis of a gyro window (sensor frame).
///
/// The window is low-passed at `cutoff_hz` first to suppress soft-tissue
/// artifact, then the top eigenvector of the sample covariance is taken.
/// The axis sign follows the strongest sample so repeated runs of the same
/// cue agree.
pub fn functional_axis(
    gyro_window: &[Vector3<f64>],
    sample_rate_hz: f64,
    cutoff_hz: f64,
) -> Option<AxisEstimate> {
    if gyro_window.len() < 8 {
        return None;
    }

    let dt = 1.0 / sample_rate_hz.max(1e-6);
    let mut lp = StaFilter::<3>::with_cutoff(cutoff_hz);
    let filtered: Vec<Vector3<f64>> = gyro_window
        .iter()
        .map(|g| {
            let out = lp.apply([g.x, g.y, g.z], dt);
            Vector3::new(out[0], out[1], out[2])
        })
        .collect();

    let mean = filtered.iter().sum::<Vector3<f64>>() / filtered.len() as f64;
    let mut cov = Matrix3::zeros();
    for g in &filtered {
        let c = g - mean;
        cov += c * c.transpose();
    }
    cov /= filtered.len() as f64;

    let eigen = cov.symmetric_eigen();
    let total: f64 = eigen.eigenvalues.iter().sum();
    if total <= 1e-12 {
        return None;
    }

    let (top_idx, top_lambda) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, l)| (i, *l))?;

    let mut axis: Vector3<f64> = eigen.eigenvectors.column(top_idx).into();

    // The eigenvector's sign is arbitrary; orient it along the opening lobe
    // of the cue (operators are instructed to start the motion in the
    // positive direction), so repeated runs agree.
    let max_norm = filtered.iter().map(|g| g.norm()).fold(0.0, f64::max);
    if let Some(opening) = filtered.iter().find(|g| g.norm() >= 0.5 * max_norm) {
        if axis.dot(opening) < 0.0 {
            axis = -axis;
        }
    }

    let confidence = top_lambda / total;
    if confidence < LOW_CONFIDENCE {
        warn!(confidence, "functional axis estimate is weak");
    }

    Some(AxisEstimate { axis, confidence })
}

/// Build the axis-alignment rotation from the functional pitch axis and the
/// gravity (up) direction, both in the sensor frame.
///
/// Basis construction (Gram-Schmidt): primary = pitch axis → anatomical X;
/// gravity orthogonalized against it → anatomical Y (up); their cross
/// product → anatomical Z. The returned rotation maps sensor coordinates
/// onto that anatomical basis.
pub fn anatomical_alignment(
    pitch_axis: Vector3<f64>,
    up_sensor: Vector3<f64>,
) -> Option<UnitQuaternion<f64>> {
    let x = pitch_axis.norm();
    let u = up_sensor.norm();
    if x < 1e-9 || u < 1e-9 {
        return None;
    }
    let x_s = pitch_axis / x;
    let up = up_sensor / u;

    let y_raw = up - x_s * up.dot(&x_s);
    if y_raw.norm() < 1e-6 {
        // Pitch axis parallel to gravity: cue was unusable.
        return None;
    }
    let y_s = y_raw.normalize();
    let z_s = x_s.cross(&y_s);

    // Columns are the sensor-frame images of the anatomical axes, so the
    // alignment (bone ← sensor) is the transpose.
    let basis = Matrix3::from_columns(&[x_s, y_s, z_s]);
    let rotation = Rotation3::from_matrix_unchecked(basis.transpose());
    Some(UnitQuaternion::from_rotation_matrix(&rotation))
}

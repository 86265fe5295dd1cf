//! Spherical mean and stillness scoring over quaternion samples.

use nalgebra::{Quaternion, UnitQuaternion};

const MEAN_ITERATIONS: usize = 10;

/// Iterative hemisphere-aligned mean on the unit quaternion sphere.
///
/// Each pass sums the samples with a sign chosen by the running mean's dot
/// product, then renormalizes. N copies of the same quaternion yield exactly
/// that quaternion.
pub fn spherical_mean(samples: &[UnitQuaternion<f64>]) -> Option<UnitQuaternion<f64>> {
    if samples.is_empty() {
        return None;
    }

    let mut mean = *samples.first()?;
    for _ in 0..MEAN_ITERATIONS {
        let mut acc = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        for s in samples {
            let sign = if mean.quaternion().dot(s.quaternion()) < 0.0 {
                -1.0
            } else {
                1.0
            };
            acc += s.quaternion() * sign;
        }
        if acc.norm() < 1e-12 {
            // Degenerate spread (antipodal cancellation); keep the seed.
            break;
        }
        mean = UnitQuaternion::from_quaternion(acc);
    }

    Some(mean)
}

/// Mean squared geodesic distance (rad²) of the samples from their mean.
///
/// Thresholds for captures: excellent < 1e-4, good < 1e-3, acceptable
/// < 1e-2.
pub fn stillness_variance(samples: &[UnitQuaternion<f64>], mean: &UnitQuaternion<f64>) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|s| {
            let angle = (mean.inverse() * s).angle();
            angle * angle
        })
        .sum();
    sum / samples.len() as f64
}

/// Exponential decay of the variance into a [0, 1] score; calibrations are
/// rejected below 0.3 (just past the "acceptable" 1e-2 rad² boundary).
pub fn stillness_score(variance: f64) -> f64 {
    (-variance / 1e-2).exp()
}

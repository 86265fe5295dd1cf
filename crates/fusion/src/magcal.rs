//! Hard/soft-iron magnetometer calibration.
//!
//! One-shot collection run: the operator rotates the sensor to sweep the
//! sphere while raw field readings accumulate. The fit estimates the hard
//! iron as the sample centroid and the soft iron from the eigenstructure of
//! the centered covariance.

use contracts::{MagCalConfig, MagCalRecord, Vec3};
use nalgebra::{Matrix3, Vector3};
use tracing::info;

use crate::convert::to_vector;

/// Sphere sectors: a 3×3×3 grid over the direction cube. Unit directions
/// never land in the center cell, leaving 26 reachable sectors.
const SECTOR_COUNT: usize = 26;

/// In-progress calibration run for one sensor.
#[derive(Debug)]
pub struct MagCalibrator {
    config: MagCalConfig,
    samples: Vec<Vector3<f64>>,
    sum: Vector3<f64>,
}

impl MagCalibrator {
    pub fn new(config: MagCalConfig) -> Self {
        Self {
            config,
            samples: Vec::with_capacity(config.min_samples * 2),
            sum: Vector3::zeros(),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Add one raw reading (µT). Non-finite readings are ignored.
    pub fn add_sample(&mut self, raw: Vec3) {
        if !raw.is_finite() {
            return;
        }
        let v = to_vector(raw);
        self.sum += v;
        self.samples.push(v);
    }

    /// Fraction of the 26 sphere sectors the centered directions have
    /// touched so far.
    pub fn sphere_coverage(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let centroid = self.sum / self.samples.len() as f64;
        let mut touched = [false; 27];
        for s in &self.samples {
            let d = s - centroid;
            let norm = d.norm();
            if norm < 1e-9 {
                continue;
            }
            touched[Self::sector_index(d / norm)] = true;
        }
        touched.iter().filter(|t| **t).count() as f64 / SECTOR_COUNT as f64
    }

    fn sector_index(dir: Vector3<f64>) -> usize {
        let cell = |v: f64| -> usize {
            if v < -1.0 / 3.0 {
                0
            } else if v <= 1.0 / 3.0 {
                1
            } else {
                2
            }
        };
        cell(dir.x) * 9 + cell(dir.y) * 3 + cell(dir.z)
    }

    /// Fit and produce the calibration record. Never applies anything
    /// itself; invalid fits come back with `valid == false` and a message.
    pub fn finish(&self, timestamp_us: u64) -> MagCalRecord {
        let n = self.samples.len();
        if n < self.config.min_samples {
            return MagCalRecord {
                sample_count: n,
                timestamp_us,
                message: format!(
                    "insufficient samples: {n} < {}",
                    self.config.min_samples
                ),
                ..MagCalRecord::identity()
            };
        }

        let coverage = self.sphere_coverage();
        let centroid = self.sum / n as f64;

        // Centered covariance.
        let mut cov = Matrix3::zeros();
        for s in &self.samples {
            let c = s - centroid;
            cov += c * c.transpose();
        }
        cov /= n as f64;

        let eigen = cov.symmetric_eigen();
        let lambda = eigen.eigenvalues;
        let lambda_mean = (lambda[0] + lambda[1] + lambda[2]) / 3.0;

        if lambda.iter().any(|l| *l <= 1e-9) || lambda_mean <= 1e-9 {
            return MagCalRecord {
                sample_count: n,
                sphere_coverage: coverage,
                timestamp_us,
                message: "degenerate sample distribution (rotate through all axes)".to_string(),
                ..MagCalRecord::identity()
            };
        }

        // Soft iron: V · diag(√(λ̄/λᵢ)) · Vᵀ equalizes the ellipsoid axes.
        let scales = Matrix3::from_diagonal(&Vector3::new(
            (lambda_mean / lambda[0]).sqrt(),
            (lambda_mean / lambda[1]).sqrt(),
            (lambda_mean / lambda[2]).sqrt(),
        ));
        let v = eigen.eigenvectors;
        let soft = v * scales * v.transpose();

        // Corrected samples have per-axis variance λ̄, so the sphere radius
        // is √(3·λ̄). (√λ̄ is the per-axis RMS, not the field magnitude.)
        let expected_magnitude = (3.0 * lambda_mean).sqrt();

        let mut sq_sum = 0.0;
        for s in &self.samples {
            let corrected = soft * (s - centroid);
            let dev = corrected.norm() - expected_magnitude;
            sq_sum += dev * dev;
        }
        let residual = (sq_sum / n as f64).sqrt();

        let residual_score = (1.0 - residual / self.config.max_residual_ut).clamp(0.0, 1.0);
        let quality =
            0.4 * coverage + 0.4 * residual_score + 0.2 * magnitude_plausibility(expected_magnitude);

        let valid = coverage >= self.config.min_sphere_coverage
            && residual < self.config.max_residual_ut
            && quality > 0.5;

        let message = if valid {
            format!("calibrated: residual {residual:.2} µT, coverage {coverage:.2}")
        } else if coverage < self.config.min_sphere_coverage {
            format!(
                "sphere coverage too low: {coverage:.2} < {:.2}",
                self.config.min_sphere_coverage
            )
        } else if residual >= self.config.max_residual_ut {
            format!("residual too high: {residual:.2} µT")
        } else {
            format!("quality too low: {quality:.2}")
        };

        info!(
            samples = n,
            coverage = format!("{coverage:.2}"),
            residual = format!("{residual:.2}"),
            quality = format!("{quality:.2}"),
            valid,
            "mag calibration finished"
        );

        let mut soft_iron = [[0.0; 3]; 3];
        for (r, row) in soft_iron.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = soft[(r, c)];
            }
        }

        MagCalRecord {
            hard_iron: Vec3::new(centroid.x, centroid.y, centroid.z),
            soft_iron,
            expected_magnitude,
            residual,
            sphere_coverage: coverage,
            sample_count: n,
            quality,
            valid,
            timestamp_us,
            message,
        }
    }
}

/// Earth-field plausibility: full credit inside 25..=65 µT, tapering to zero
/// at 15 and 75 µT.
fn magnitude_plausibility(magnitude: f64) -> f64 {
    if (25.0..=65.0).contains(&magnitude) {
        1.0
    } else if magnitude < 25.0 {
        ((magnitude - 15.0) / 10.0).clamp(0.0, 1.0)
    } else {
        ((75.0 - magnitude) / 10.0).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fibonacci sphere: near-uniform directions without randomness.
    fn sphere_directions(n: usize) -> Vec<Vector3<f64>> {
        let golden = std::f64::consts::PI * (3.0 - 5.0f64.sqrt());
        (0..n)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
                let r = (1.0 - y * y).sqrt();
                let theta = golden * i as f64;
                Vector3::new(r * theta.cos(), y, r * theta.sin())
            })
            .collect()
    }

    fn calibrator() -> MagCalibrator {
        MagCalibrator::new(MagCalConfig::default())
    }

    #[test]
    fn test_insufficient_samples_invalid() {
        let mut cal = calibrator();
        for d in sphere_directions(50) {
            cal.add_sample(Vec3::new(d.x * 50.0, d.y * 50.0, d.z * 50.0));
        }
        let record = cal.finish(1);
        assert!(!record.valid);
        assert!(record.message.contains("insufficient"));
    }

    #[test]
    fn test_clean_sphere_calibrates() {
        let mut cal = calibrator();
        for d in sphere_directions(400) {
            let v = d * 50.0;
            cal.add_sample(Vec3::new(v.x, v.y, v.z));
        }
        let record = cal.finish(1);
        assert!(record.valid, "{}", record.message);
        assert!(record.hard_iron.norm() < 1.0);
        assert!((record.expected_magnitude - 50.0).abs() < 2.0);
        assert!(record.residual < 1.0);
        assert!(record.sphere_coverage > 0.9);
    }

    #[test]
    fn test_hard_iron_recovered() {
        let offset = Vector3::new(12.0, -7.0, 3.0);
        let mut cal = calibrator();
        for d in sphere_directions(400) {
            let v = d * 45.0 + offset;
            cal.add_sample(Vec3::new(v.x, v.y, v.z));
        }
        let record = cal.finish(1);
        assert!(record.valid, "{}", record.message);
        assert!((record.hard_iron.x - 12.0).abs() < 0.5);
        assert!((record.hard_iron.y + 7.0).abs() < 0.5);
        assert!((record.hard_iron.z - 3.0).abs() < 0.5);
    }

    #[test]
    fn test_soft_iron_apply_roundtrip() {
        // Distort the sphere: stretch x by 1.5, shrink z by 0.8, offset it.
        let offset = Vector3::new(5.0, 0.0, -9.0);
        let distortion = Matrix3::from_diagonal(&Vector3::new(1.5, 1.0, 0.8));

        let mut cal = calibrator();
        let truth: Vec<Vector3<f64>> = sphere_directions(600).iter().map(|d| d * 50.0).collect();
        for v in &truth {
            let raw = distortion * v + offset;
            cal.add_sample(Vec3::new(raw.x, raw.y, raw.z));
        }

        let record = cal.finish(1);
        assert!(record.valid, "{}", record.message);

        // Corrected magnitudes must be uniform again.
        for v in truth.iter().take(50) {
            let raw = distortion * v + offset;
            let corrected = record.apply(Vec3::new(raw.x, raw.y, raw.z));
            assert!(
                (corrected.norm() - record.expected_magnitude).abs() < 1.0,
                "corrected magnitude {} vs target {}",
                corrected.norm(),
                record.expected_magnitude
            );
        }
    }

    #[test]
    fn test_partial_coverage_rejected() {
        let mut cal = calibrator();
        // Only the upper cap of the sphere.
        for d in sphere_directions(800) {
            if d.y > 0.6 {
                let v = d * 50.0;
                cal.add_sample(Vec3::new(v.x, v.y, v.z));
            }
        }
        let record = cal.finish(1);
        assert!(!record.valid);
        assert!(record.sphere_coverage < 0.6, "cap covers few sectors");
    }

    #[test]
    fn test_coverage_tracks_progress() {
        let mut cal = calibrator();
        assert_eq!(cal.sphere_coverage(), 0.0);
        for d in sphere_directions(300) {
            let v = d * 50.0;
            cal.add_sample(Vec3::new(v.x, v.y, v.z));
        }
        assert!(cal.sphere_coverage() > 0.8);
    }
}

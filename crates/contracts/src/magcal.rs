//! Magnetometer calibration records - the persisted hard/soft-iron state.

use serde::{Deserialize, Serialize};

use crate::Vec3;

/// Result of a completed hard/soft-iron calibration run.
///
/// This is the self-describing on-disk record; `valid == false` records are
/// kept for diagnostics but never applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagCalRecord {
    /// DC offset (µT)
    pub hard_iron: Vec3,

    /// Symmetric positive-definite shape correction, row-major
    pub soft_iron: [[f64; 3]; 3],

    /// Field magnitude the correction normalizes toward (µT)
    pub expected_magnitude: f64,

    /// RMS deviation of corrected magnitudes from the target (µT)
    pub residual: f64,

    /// Fraction of the 26 sphere sectors touched during collection
    pub sphere_coverage: f64,

    /// Readings consumed
    pub sample_count: usize,

    /// Combined score in [0, 1]: coverage 40%, residual 40%, magnitude
    /// plausibility 20%
    pub quality: f64,

    /// residual below threshold and quality above 0.5
    pub valid: bool,

    /// Capture time (µs of session time)
    pub timestamp_us: u64,

    /// Operator-facing outcome summary
    pub message: String,
}

impl MagCalRecord {
    /// An identity record: no correction, marked invalid.
    pub fn identity() -> Self {
        Self {
            hard_iron: Vec3::default(),
            soft_iron: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            expected_magnitude: 0.0,
            residual: f64::INFINITY,
            sphere_coverage: 0.0,
            sample_count: 0,
            quality: 0.0,
            valid: false,
            timestamp_us: 0,
            message: "not calibrated".to_string(),
        }
    }

    /// Apply the correction: `soft_iron · (raw − hard_iron)`.
    pub fn apply(&self, raw: Vec3) -> Vec3 {
        let c = Vec3::new(
            raw.x - self.hard_iron.x,
            raw.y - self.hard_iron.y,
            raw.z - self.hard_iron.z,
        );
        let m = &self.soft_iron;
        Vec3::new(
            m[0][0] * c.x + m[0][1] * c.y + m[0][2] * c.z,
            m[1][0] * c.x + m[1][1] * c.y + m[1][2] * c.z,
            m[2][0] * c.x + m[2][1] * c.y + m[2][2] * c.z,
        )
    }
}

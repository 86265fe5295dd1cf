//! Orientation fusion configuration shared across crates.

use serde::{Deserialize, Serialize};

/// Standard gravity (m/s²).
pub const G_STD: f64 = 9.80665;

/// Per-sensor orientation filter tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Accel-magnitude deviation from gravity below which the sensor can be
    /// at rest (m/s²)
    pub rest_accel_threshold: f64,

    /// Gyro norm below which the sensor can be at rest (rad/s)
    pub rest_gyro_threshold: f64,

    /// Relative accel-magnitude deviation classified as external
    /// acceleration
    pub external_accel_tolerance: f64,

    /// Tilt correction gain at rest
    pub rest_gain: f64,

    /// Tilt correction gain at full motion
    pub motion_gain: f64,

    /// Gyro norm at which the gain blend saturates (rad/s)
    pub motion_threshold: f64,

    /// Gyro norm above which tilt correction is withheld (rad/s)
    pub tilt_gyro_limit: f64,

    /// Gyro-bias smoothing factor applied while at rest
    pub bias_alpha: f64,

    /// Gyro norm treated as a bogus frame (rad/s)
    pub max_gyro_norm: f64,

    /// Whether magnetometer heading correction runs at all
    pub mag_enabled: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rest_accel_threshold: 0.2,
            rest_gyro_threshold: 0.03,
            external_accel_tolerance: 0.15,
            rest_gain: 0.05,
            motion_gain: 0.005,
            motion_threshold: 0.1,
            tilt_gyro_limit: 0.26,
            bias_alpha: 0.05,
            max_gyro_norm: 100.0,
            mag_enabled: true,
        }
    }
}

/// Local magnetic field model used by the disturbance detector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocalMagneticField {
    /// Expected field magnitude (µT)
    pub magnitude_ut: f64,

    /// Expected dip angle (degrees below horizontal)
    pub dip_deg: f64,
}

impl Default for LocalMagneticField {
    fn default() -> Self {
        Self {
            magnitude_ut: 50.0,
            dip_deg: 60.0,
        }
    }
}

/// Magnetic disturbance detector tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DisturbanceConfig {
    /// Relative magnitude deviation flagged as disturbance
    pub magnitude_tolerance: f64,

    /// Field slew rate flagged as disturbance (µT/s)
    pub max_gradient_ut_per_s: f64,

    /// Dip-angle deviation flagged as disturbance (degrees)
    pub dip_tolerance_deg: f64,

    /// Smoothing time constant for magnitude and dip (seconds)
    pub smoothing_tau_s: f64,

    /// Clean time after which the heading weight reaches 1.0 (ms)
    pub min_clean_duration_ms: u64,
}

impl Default for DisturbanceConfig {
    fn default() -> Self {
        Self {
            magnitude_tolerance: 0.25,
            max_gradient_ut_per_s: 50.0,
            dip_tolerance_deg: 15.0,
            smoothing_tau_s: 0.5,
            min_clean_duration_ms: 500,
        }
    }
}

/// Magnetometer calibration run tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MagCalConfig {
    /// Minimum readings before a fit is attempted
    pub min_samples: usize,

    /// Minimum fraction of the 26 sphere sectors that must be touched
    pub min_sphere_coverage: f64,

    /// RMS residual (µT) above which the fit is invalid
    pub max_residual_ut: f64,
}

impl Default for MagCalConfig {
    fn default() -> Self {
        Self {
            min_samples: 200,
            min_sphere_coverage: 0.6,
            max_residual_ut: 5.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fusion_defaults() {
        let config = FusionConfig::default();
        assert_eq!(config.rest_accel_threshold, 0.2);
        assert_eq!(config.rest_gyro_threshold, 0.03);
        assert_eq!(config.rest_gain, 0.05);
        assert_eq!(config.motion_gain, 0.005);
        assert!(config.mag_enabled);
    }

    #[test]
    fn test_disturbance_defaults() {
        let config = DisturbanceConfig::default();
        assert_eq!(config.magnitude_tolerance, 0.25);
        assert_eq!(config.max_gradient_ut_per_s, 50.0);
        assert_eq!(config.dip_tolerance_deg, 15.0);
        assert_eq!(config.min_clean_duration_ms, 500);
    }
}

//! Magnetic disturbance detector.
//!
//! Three independent checks over a calibrated field reading: magnitude,
//! gradient, and dip angle. Magnitude and dip run on exponential moving
//! averages; the gradient check is instantaneous since a step in the field
//! must zero the heading weight on the very tick it appears.

use contracts::{DisturbanceConfig, LocalMagneticField};
use nalgebra::Vector3;
use tracing::trace;

/// Which check fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisturbanceKind {
    None,
    Magnitude,
    Gradient,
    Dip,
    Multiple,
}

/// One tick's verdict.
#[derive(Debug, Clone, Copy)]
pub struct DisturbanceAssessment {
    pub disturbed: bool,
    pub kind: DisturbanceKind,
    /// Heading correction weight in [0, 1]
    pub weight: f64,
}

/// Stateful detector, one per sensor.
#[derive(Debug)]
pub struct DisturbanceDetector {
    config: DisturbanceConfig,
    field: LocalMagneticField,
    ema_magnitude: Option<f64>,
    ema_dip_deg: Option<f64>,
    prev_mag: Option<Vector3<f64>>,
    /// Time spent clean since the last disturbance (ms)
    clean_ms: f64,
}

impl DisturbanceDetector {
    pub fn new(config: DisturbanceConfig, field: LocalMagneticField) -> Self {
        Self {
            config,
            field,
            ema_magnitude: None,
            ema_dip_deg: None,
            prev_mag: None,
            clean_ms: 0.0,
        }
    }

    /// Swap the expected field model (operator override).
    pub fn set_field(&mut self, field: LocalMagneticField) {
        self.field = field;
    }

    pub fn reset(&mut self) {
        self.ema_magnitude = None;
        self.ema_dip_deg = None;
        self.prev_mag = None;
        self.clean_ms = 0.0;
    }

    /// Assess one calibrated reading. `accel` supplies the gravity direction
    /// for the dip check; `dt` is seconds since the previous reading.
    pub fn update(
        &mut self,
        mag: Vector3<f64>,
        accel: Vector3<f64>,
        dt: f64,
    ) -> DisturbanceAssessment {
        let dt = dt.max(1e-4);
        let alpha = dt / (self.config.smoothing_tau_s + dt);

        let magnitude = mag.norm();
        let ema_mag = match self.ema_magnitude {
            Some(prev) => prev + alpha * (magnitude - prev),
            None => magnitude,
        };
        self.ema_magnitude = Some(ema_mag);

        let mut checks = 0u32;
        let mut kind = DisturbanceKind::None;
        let mut fire = |k: DisturbanceKind, kind: &mut DisturbanceKind| {
            checks += 1;
            *kind = if checks > 1 { DisturbanceKind::Multiple } else { k };
        };

        let expected = self.field.magnitude_ut.max(1e-6);
        if (ema_mag - expected).abs() / expected > self.config.magnitude_tolerance {
            fire(DisturbanceKind::Magnitude, &mut kind);
        }

        if let Some(prev) = self.prev_mag {
            let gradient = (mag - prev).norm() / dt;
            if gradient > self.config.max_gradient_ut_per_s {
                fire(DisturbanceKind::Gradient, &mut kind);
            }
        }
        self.prev_mag = Some(mag);

        if magnitude > 1e-6 && accel.norm() > 1e-6 {
            let cos = (mag.normalize().dot(&accel.normalize())).abs().min(1.0);
            let dip_deg = cos.asin().to_degrees();
            let ema_dip = match self.ema_dip_deg {
                Some(prev) => prev + alpha * (dip_deg - prev),
                None => dip_deg,
            };
            self.ema_dip_deg = Some(ema_dip);
            if (ema_dip - self.field.dip_deg).abs() > self.config.dip_tolerance_deg {
                fire(DisturbanceKind::Dip, &mut kind);
            }
        }

        let disturbed = checks > 0;
        if disturbed {
            self.clean_ms = 0.0;
            trace!(?kind, "magnetic disturbance");
            metrics::counter!("mocap_mag_disturbed_total").increment(1);
        } else {
            self.clean_ms += dt * 1000.0;
        }

        DisturbanceAssessment {
            disturbed,
            kind,
            weight: self.weight(disturbed),
        }
    }

    /// Weight ramp: 0 while disturbed, then from 0.1 up to 1.0 over the
    /// configured clean duration.
    fn weight(&self, disturbed: bool) -> f64 {
        if disturbed {
            return 0.0;
        }
        let ramp = self.config.min_clean_duration_ms as f64;
        if self.clean_ms >= ramp {
            1.0
        } else {
            0.1 + 0.9 * (self.clean_ms / ramp)
        }
    }
}

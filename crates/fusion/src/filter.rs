//! Per-sensor orientation filter.
//!
//! Gyro integration is the backbone; gravity corrects tilt with an adaptive
//! gain and the magnetometer corrects heading through the disturbance
//! weight. World frame is Y-up with north along -Z.

use contracts::{
    FusionConfig, LocalMagneticField, MagCalRecord, Quat, Vec3, G_STD,
};
use nalgebra::{Quaternion, Unit, UnitQuaternion, Vector3};
use tracing::{debug, warn};

use crate::convert::{quat_to_contract, to_vector};
use crate::disturbance::DisturbanceDetector;

/// Physically-plausible cap on the learned gyro bias (rad/s).
const MAX_GYRO_BIAS: f64 = 0.05;

/// Heading uncertainty floor/ceiling (degrees).
const HEADING_UNCERTAINTY_FLOOR: f64 = 5.0;
const HEADING_UNCERTAINTY_CEIL: f64 = 180.0;

/// Below this weight a heading correction is not worth applying.
const MIN_HEADING_WEIGHT: f64 = 0.1;

/// Horizontal fraction of the field below which heading is unobservable
/// (near a magnetic pole, or garbage data).
const MIN_HORIZONTAL_MAG: f64 = 0.1;

/// Small-angle short-circuit for the predict step.
const MIN_PREDICT_ANGLE: f64 = 1e-10;

/// Read-only view of the filter state.
#[derive(Debug, Clone, Copy)]
pub struct FusionStatus {
    pub rest: bool,
    pub external_accel: bool,
    pub mag_disturbed: bool,
    pub heading_uncertainty_deg: f64,
    pub update_count: u64,
    pub converged: bool,
}

/// 9-axis orientation filter for one sensor.
#[derive(Debug)]
pub struct OrientationFilter {
    config: FusionConfig,
    q: UnitQuaternion<f64>,
    bias: Vector3<f64>,
    mag_cal: MagCalRecord,
    disturbance: DisturbanceDetector,

    rest: bool,
    external_accel: bool,
    mag_disturbed: bool,
    heading_uncertainty_deg: f64,
    last_tilt_error_deg: f64,
    update_count: u64,
    initialized: bool,
}

impl OrientationFilter {
    pub fn new(config: FusionConfig, field: LocalMagneticField) -> Self {
        Self {
            config,
            q: UnitQuaternion::identity(),
            bias: Vector3::zeros(),
            mag_cal: MagCalRecord::identity(),
            disturbance: DisturbanceDetector::new(Default::default(), field),
            rest: false,
            external_accel: false,
            mag_disturbed: false,
            heading_uncertainty_deg: HEADING_UNCERTAINTY_CEIL,
            last_tilt_error_deg: 0.0,
            update_count: 0,
            initialized: false,
        }
    }

    /// Install a calibration record; invalid records are refused and the
    /// previous correction stays in place.
    pub fn set_mag_calibration(&mut self, record: MagCalRecord) -> bool {
        if record.valid {
            self.mag_cal = record;
            true
        } else {
            warn!(quality = record.quality, "refusing invalid mag calibration");
            false
        }
    }

    pub fn set_mag_enabled(&mut self, enabled: bool) {
        self.config.mag_enabled = enabled;
    }

    pub fn set_local_field(&mut self, field: LocalMagneticField) {
        self.disturbance.set_field(field);
    }

    /// Current orientation (world frame, sensor axes), w >= 0.
    pub fn quat(&self) -> Quat {
        quat_to_contract(&self.q)
    }

    pub fn quat_na(&self) -> UnitQuaternion<f64> {
        self.q
    }

    pub fn gyro_bias(&self) -> Vec3 {
        Vec3::new(self.bias.x, self.bias.y, self.bias.z)
    }

    pub fn status(&self) -> FusionStatus {
        FusionStatus {
            rest: self.rest,
            external_accel: self.external_accel,
            mag_disturbed: self.mag_disturbed,
            heading_uncertainty_deg: self.heading_uncertainty_deg,
            update_count: self.update_count,
            converged: self.converged(),
        }
    }

    /// Settled enough for recording: enough updates and a small tilt error.
    pub fn converged(&self) -> bool {
        self.update_count >= 200 && self.last_tilt_error_deg < 2.0
    }

    /// Drop all state back to power-on.
    pub fn reset(&mut self) {
        let config = self.config;
        let mag_cal = self.mag_cal.clone();
        let mut fresh = Self::new(config, LocalMagneticField::default());
        fresh.mag_cal = mag_cal;
        std::mem::swap(&mut fresh.disturbance, &mut self.disturbance);
        *self = fresh;
        self.disturbance.reset();
    }

    /// One fusion tick.
    pub fn update(&mut self, dt: f64, gyro: Vec3, accel: Vec3, mag: Option<Vec3>) {
        if !gyro.is_finite()
            || !accel.is_finite()
            || mag.map_or(false, |m| !m.is_finite())
            || !dt.is_finite()
        {
            warn!("non-finite fusion input, resetting sensor state");
            metrics::counter!("mocap_fusion_resets_total").increment(1);
            self.reset();
            return;
        }

        let g = to_vector(gyro);
        let a = to_vector(accel);
        let dt = dt.max(1e-6);

        if !self.initialized {
            self.initialize(a, mag.map(to_vector));
        }

        let gyro_norm = g.norm();

        // ===== Predict =====
        if gyro_norm > self.config.max_gyro_norm {
            // Bogus frame; hold the attitude rather than integrating garbage.
            debug!(gyro_norm, "skipping predict for bogus gyro sample");
            metrics::counter!("mocap_fusion_bogus_gyro_total").increment(1);
        } else {
            let w = g - self.bias;
            let angle = w.norm() * dt;
            if angle >= MIN_PREDICT_ANGLE {
                let axis = Unit::new_normalize(w);
                self.q *= UnitQuaternion::from_axis_angle(&axis, angle);
                self.q.renormalize_fast();
            }
        }

        // ===== Classify motion =====
        let accel_norm = a.norm();
        let accel_dev = (accel_norm - G_STD).abs();
        self.rest = accel_dev < self.config.rest_accel_threshold
            && gyro_norm < self.config.rest_gyro_threshold;
        self.external_accel = accel_dev > self.config.external_accel_tolerance * G_STD;

        let blend = (gyro_norm / self.config.motion_threshold).min(1.0);
        let gain = self.config.rest_gain + blend * (self.config.motion_gain - self.config.rest_gain);

        // ===== Bias update =====
        if self.rest {
            self.bias += self.config.bias_alpha * (g - self.bias);
            let norm = self.bias.norm();
            if norm > MAX_GYRO_BIAS {
                self.bias *= MAX_GYRO_BIAS / norm;
            }
        }

        // ===== Tilt correction =====
        if !self.external_accel && gyro_norm < self.config.tilt_gyro_limit && accel_norm > 1e-6 {
            let up = Vector3::y();
            let a_world = self.q * (a / accel_norm);
            if let Some(correction) = UnitQuaternion::rotation_between(&a_world, &up) {
                self.last_tilt_error_deg = correction.angle().to_degrees();
                self.q = correction.powf(gain) * self.q;
            } else {
                // Anti-parallel: flip around a fixed non-colinear axis.
                self.q = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI * gain)
                    * self.q;
                self.last_tilt_error_deg = 180.0;
            }
            self.select_hemisphere();
        }

        // ===== Heading correction =====
        if self.config.mag_enabled {
            if let Some(m) = mag {
                self.heading_tick(dt, to_vector(m), a, gain);
            }
        }

        self.update_count += 1;
    }

    fn heading_tick(&mut self, dt: f64, raw: Vector3<f64>, accel: Vector3<f64>, gain: f64) {
        let calibrated = {
            let c = self.mag_cal.apply(Vec3::new(raw.x, raw.y, raw.z));
            Vector3::new(c.x, c.y, c.z)
        };

        let verdict = self.disturbance.update(calibrated, accel, dt);
        self.mag_disturbed = verdict.disturbed;

        if verdict.weight < MIN_HEADING_WEIGHT {
            self.grow_heading_uncertainty();
            return;
        }

        let norm = calibrated.norm();
        if norm < 1e-6 {
            self.grow_heading_uncertainty();
            return;
        }
        let m_world = self.q * (calibrated / norm);
        let horizontal = (m_world.x * m_world.x + m_world.z * m_world.z).sqrt();
        if horizontal < MIN_HORIZONTAL_MAG {
            // Near-vertical field: heading unobservable.
            self.grow_heading_uncertainty();
            return;
        }

        // Yaw needed to swing the horizontal field onto north (-Z).
        let heading_error = m_world.x.atan2(-m_world.z);
        let correction = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), heading_error);
        // Heading always corrects slower than tilt.
        self.q = correction.powf(gain * verdict.weight * 0.5) * self.q;
        self.select_hemisphere();

        self.heading_uncertainty_deg = HEADING_UNCERTAINTY_FLOOR
            + (self.heading_uncertainty_deg - HEADING_UNCERTAINTY_FLOOR) * 0.95;
    }

    fn grow_heading_uncertainty(&mut self) {
        self.heading_uncertainty_deg = HEADING_UNCERTAINTY_CEIL
            - (HEADING_UNCERTAINTY_CEIL - self.heading_uncertainty_deg) * 0.995;
    }

    /// Align the sensor "up" with world +Y from a single accel reading, then
    /// (if a field is available) yaw the horizontal field onto north.
    fn initialize(&mut self, accel: Vector3<f64>, mag: Option<Vector3<f64>>) {
        let norm = accel.norm();
        if norm < 1e-6 {
            return;
        }
        let a_hat = accel / norm;
        let up = Vector3::y();
        self.q = UnitQuaternion::rotation_between(&a_hat, &up).unwrap_or_else(|| {
            // Nearly anti-parallel: pick a fixed non-colinear axis.
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI)
        });

        if self.config.mag_enabled {
            if let Some(m) = mag {
                let m_world = self.q * m;
                let horizontal = (m_world.x * m_world.x + m_world.z * m_world.z).sqrt();
                if horizontal >= MIN_HORIZONTAL_MAG * m.norm().max(1e-6) {
                    let yaw = m_world.x.atan2(-m_world.z);
                    self.q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw) * self.q;
                }
            }
        }

        self.select_hemisphere();
        self.initialized = true;
        debug!("fusion initialized from first accel sample");
    }

    #[inline]
    fn select_hemisphere(&mut self) {
        if self.q.quaternion().w < 0.0 {
            let c = self.q.quaternion();
            self.q = UnitQuaternion::new_unchecked(Quaternion::new(-c.w, -c.i, -c.j, -c.k));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 1.0 / 60.0;

    fn filter() -> OrientationFilter {
        OrientationFilter::new(FusionConfig::default(), LocalMagneticField::default())
    }

    fn flat_accel() -> Vec3 {
        Vec3::new(0.0, G_STD, 0.0)
    }

    #[test]
    fn test_initializes_level_when_flat() {
        let mut f = filter();
        f.update(DT, Vec3::default(), flat_accel(), None);
        let q = f.quat();
        assert!((q.norm() - 1.0).abs() < 1e-3);
        assert!(q.w > 0.999, "flat sensor should be near identity, got {q:?}");
    }

    #[test]
    fn test_pitch_from_tilted_gravity() {
        // Sensor pitched down 45°: gravity reads (0, g·cos45, g·sin45).
        let a = Vec3::new(0.0, G_STD * 0.5f64.sqrt(), G_STD * 0.5f64.sqrt());
        let mut f = filter();
        for _ in 0..200 {
            f.update(DT, Vec3::default(), a, None);
        }
        // Expect a pure -45° rotation about X.
        let q = f.quat_na();
        let expected = UnitQuaternion::from_axis_angle(
            &Vector3::x_axis(),
            -std::f64::consts::FRAC_PI_4,
        );
        let error = (q.inverse() * expected).angle().to_degrees();
        assert!(error < 2.0, "attitude error {error}° too large");
    }

    #[test]
    fn test_gyro_integration_tracks_rotation() {
        let mut f = filter();
        f.update(DT, Vec3::default(), flat_accel(), None);

        // Rotate about the sensor Y axis at 1 rad/s for 0.5 s with no
        // usable accel correction (gyro norm gates tilt).
        for _ in 0..30 {
            f.update(DT, Vec3::new(0.0, 1.0, 0.0), flat_accel(), None);
        }
        let yaw = 2.0 * f.quat_na().quaternion().j.asin();
        assert!((yaw - 0.5).abs() < 0.05, "integrated yaw {yaw} != 0.5 rad");
    }

    #[test]
    fn test_rest_classification_and_bias_learning() {
        let mut f = filter();
        let biased_gyro = Vec3::new(0.01, 0.0, 0.0);
        for _ in 0..300 {
            f.update(DT, biased_gyro, flat_accel(), None);
        }
        assert!(f.status().rest);
        assert!((f.gyro_bias().x - 0.01).abs() < 0.002, "bias should converge");
        assert!(f.gyro_bias().norm() <= MAX_GYRO_BIAS + 1e-12);
    }

    #[test]
    fn test_external_accel_blocks_tilt_correction() {
        let mut f = filter();
        f.update(DT, Vec3::default(), flat_accel(), None);
        let before = f.quat();

        // 2 g along an off-axis: clearly external acceleration.
        for _ in 0..50 {
            f.update(DT, Vec3::default(), Vec3::new(2.0 * G_STD, G_STD, 0.0), None);
        }
        assert!(f.status().external_accel);
        let after = f.quat();
        let dot = before.w * after.w + before.x * after.x + before.y * after.y + before.z * after.z;
        assert!(dot.abs() > 0.9999, "attitude must hold under external accel");
    }

    #[test]
    fn test_bogus_gyro_frame_skipped() {
        let mut f = filter();
        f.update(DT, Vec3::default(), flat_accel(), None);
        let before = f.quat();
        f.update(DT, Vec3::new(500.0, 0.0, 0.0), flat_accel(), None);
        let after = f.quat();
        assert!((before.w - after.w).abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_input_resets() {
        let mut f = filter();
        for _ in 0..250 {
            f.update(DT, Vec3::default(), flat_accel(), None);
        }
        assert!(f.status().update_count >= 250);

        f.update(DT, Vec3::new(f64::NAN, 0.0, 0.0), flat_accel(), None);
        assert_eq!(f.status().update_count, 0);
        assert_eq!(f.quat(), Quat::IDENTITY);
    }

    #[test]
    fn test_heading_corrects_toward_north() {
        let mut f = filter();
        // Field pointing along -Z (north) with a 60° dip component: world
        // frame field as the flat sensor sees it.
        let field = LocalMagneticField::default();
        let dip = field.dip_deg.to_radians();
        let m = Vec3::new(0.0, -field.magnitude_ut * dip.sin(), -field.magnitude_ut * dip.cos());

        for _ in 0..400 {
            f.update(DT, Vec3::default(), flat_accel(), Some(m));
        }
        assert!(!f.status().mag_disturbed);
        assert!(f.status().heading_uncertainty_deg < 90.0);
        // Horizontal field already points north: heading must stay put.
        let q = f.quat();
        assert!(q.w > 0.999, "heading should not drift, got {q:?}");
    }

    #[test]
    fn test_hemisphere_on_every_output() {
        let mut f = filter();
        for i in 0..500 {
            let spin = Vec3::new(0.0, 3.0, 0.0);
            let accel = if i % 3 == 0 { flat_accel() } else { Vec3::new(0.1, G_STD, 0.2) };
            f.update(DT, spin, accel, None);
            assert!(f.quat().w >= 0.0);
            assert!((f.quat().norm() - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_convergence_gate() {
        let mut f = filter();
        for _ in 0..100 {
            f.update(DT, Vec3::default(), flat_accel(), None);
        }
        assert!(!f.converged(), "needs at least 200 updates");
        for _ in 0..150 {
            f.update(DT, Vec3::default(), flat_accel(), None);
        }
        assert!(f.converged());
    }
}

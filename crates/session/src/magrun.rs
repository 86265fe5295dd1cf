//! Magnetometer calibration run lifecycle.
//!
//! A run collects raw readings for one sensor while the rest of the session
//! keeps streaming; only `finish` produces a record and only valid records
//! are ever applied.

use std::collections::HashMap;

use contracts::{MagCalConfig, MagCalRecord, PipelineError, SensorId, Vec3};
use fusion::MagCalibrator;
use tracing::info;

/// Tracks at most one active calibration run per sensor.
#[derive(Debug, Default)]
pub struct MagCalRunner {
    config: MagCalConfig,
    active: HashMap<SensorId, MagCalibrator>,
}

impl MagCalRunner {
    pub fn new(config: MagCalConfig) -> Self {
        Self {
            config,
            active: HashMap::new(),
        }
    }

    /// Begin (or restart) a run for a sensor.
    pub fn start(&mut self, sensor: SensorId) {
        info!(sensor_id = %sensor, "mag calibration started");
        self.active.insert(sensor, MagCalibrator::new(self.config));
    }

    pub fn is_active(&self, sensor: &str) -> bool {
        self.active.contains_key(sensor)
    }

    /// Route a raw reading into the sensor's run, if one is active.
    pub fn add_sample(&mut self, sensor: &str, raw: Vec3) {
        if let Some(run) = self.active.get_mut(sensor) {
            run.add_sample(raw);
        }
    }

    /// Collection progress for operator feedback.
    pub fn progress(&self, sensor: &str) -> Option<(usize, f64)> {
        self.active
            .get(sensor)
            .map(|run| (run.sample_count(), run.sphere_coverage()))
    }

    /// Fit and close the run. The record may be invalid; the caller decides
    /// whether to apply it (it must not when `valid == false`).
    pub fn finish(
        &mut self,
        sensor: &SensorId,
        timestamp_us: u64,
    ) -> Result<MagCalRecord, PipelineError> {
        let run = self
            .active
            .remove(sensor.as_str())
            .ok_or_else(|| PipelineError::NoActiveCalibration {
                sensor_id: sensor.to_string(),
            })?;
        Ok(run.finish(timestamp_us))
    }

    /// Abort a run without fitting.
    pub fn cancel(&mut self, sensor: &str) {
        self.active.remove(sensor);
    }
}

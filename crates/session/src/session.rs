//! MocapSession - the owning facade over the numerical pipeline.

use std::collections::{HashMap, VecDeque};

use contracts::{
    JointAngles, LocalMagneticField, MagCalRecord, MotionFrame, PipelineError, Quat, Segment,
    SensorId, SessionBlueprint, SyncFrame, SyncMeta, TareLevel, TareStore, Vec3,
};
use fusion::OrientationFilter;
use ingestion::{FrameDecoder, WireIdMap};
use nalgebra::Vector3;
use orientation::{
    anatomical_alignment, capture_mounting_robust, capture_mounting_single,
    capture_mounting_two_layer, compute_heading_tare, decompose_joint, functional_axis,
    to_vector, TarePipeline,
};
use sync_engine::SyncEngine;
use tracing::{info, instrument, warn};

use crate::magrun::MagCalRunner;

/// Host-side capture session: decoder → sync → fusion → orientation.
pub struct MocapSession {
    /// Sensor name → mounted segment
    segment_of: HashMap<SensorId, Segment>,
    /// Segment → sensor name
    sensor_of: HashMap<Segment, SensorId>,

    decoder: FrameDecoder,
    engine: SyncEngine,
    filters: HashMap<SensorId, OrientationFilter>,
    tares: TareStore,
    mag_runs: MagCalRunner,
    mag_records: HashMap<SensorId, MagCalRecord>,
    /// Latest raw field reading per sensor, consumed by the fusion heading
    /// path (the sync-frame wire record carries no magnetometer channel)
    latest_mag: HashMap<SensorId, Vec3>,

    blueprint: SessionBlueprint,
    nominal_dt: f64,

    /// Per-sensor previous beacon timestamp, for dt computation
    last_ts: HashMap<SensorId, u32>,
    /// Monotonic session clock accumulated from beacon deltas (µs)
    clock_us: u64,
    clock_anchor: Option<u32>,

    out: VecDeque<MotionFrame>,
}

impl MocapSession {
    pub fn new(blueprint: SessionBlueprint) -> Self {
        let mut segment_of = HashMap::new();
        let mut sensor_of = HashMap::new();
        let mut ids = WireIdMap::default();
        let mut filters = HashMap::new();

        for mapping in &blueprint.sensors {
            let sensor: SensorId = mapping.name.as_str().into();
            segment_of.insert(sensor.clone(), mapping.segment);
            sensor_of.insert(mapping.segment, sensor.clone());
            ids.insert(mapping.wire_id, sensor.clone());
            filters.insert(
                sensor,
                OrientationFilter::new(blueprint.fusion, blueprint.magnetic.local_field),
            );
        }

        let engine = SyncEngine::new(blueprint.to_sync_engine_config());
        let decoder = FrameDecoder::new(blueprint.session.default_node_id, ids);
        let nominal_dt = 1.0 / blueprint.session.sample_rate_hz.max(1e-3);
        let mag_runs = MagCalRunner::new(blueprint.magnetic.calibration);

        Self {
            segment_of,
            sensor_of,
            decoder,
            engine,
            filters,
            tares: TareStore::default(),
            mag_runs,
            mag_records: HashMap::new(),
            latest_mag: HashMap::new(),
            blueprint,
            nominal_dt,
            last_ts: HashMap::new(),
            clock_us: 0,
            clock_anchor: None,
            out: VecDeque::new(),
        }
    }

    // ===== Streaming =====

    /// Feed transport bytes. `now_ms` is the caller's monotonic clock shared
    /// with [`MocapSession::pop_frames`].
    #[instrument(level = "trace", name = "session_feed", skip(self, bytes), fields(len = bytes.len()))]
    pub fn feed(&mut self, bytes: &[u8], now_ms: u64) {
        for batch in self.decoder.feed(bytes) {
            let frames = self.engine.push(batch, now_ms);
            self.process_frames(frames);
        }
    }

    /// Feed an already-decoded batch (e.g. from an ingestion pipeline that
    /// runs its own decoder).
    pub fn push_batch(&mut self, batch: contracts::SampleBatch, now_ms: u64) {
        let frames = self.engine.push(batch, now_ms);
        self.process_frames(frames);
    }

    /// Drain processed motion frames; also fires the sync layer's timeout
    /// releases.
    pub fn pop_frames(&mut self, now_ms: u64) -> Vec<MotionFrame> {
        let frames = self.engine.poll(now_ms);
        self.process_frames(frames);
        self.out.drain(..).collect()
    }

    /// Sync-layer counters (drops, resets, incomplete slots).
    pub fn sync_meta(&self) -> SyncMeta {
        self.engine.meta()
    }

    fn process_frames(&mut self, frames: Vec<SyncFrame>) {
        for frame in frames {
            self.advance_clock(frame.timestamp_us);
            self.fuse_frame(&frame);
            let motion = self.assemble_motion(&frame);
            metrics::counter!("mocap_motion_frames_total").increment(1);
            self.out.push_back(motion);
        }
    }

    fn advance_clock(&mut self, ts: u32) {
        if let Some(anchor) = self.clock_anchor {
            let delta = ts.wrapping_sub(anchor);
            // Ignore modular "backwards" deltas from reordered emissions.
            if delta < u32::MAX / 2 {
                self.clock_us += delta as u64;
            }
        }
        self.clock_anchor = Some(ts);
    }

    fn fuse_frame(&mut self, frame: &SyncFrame) {
        for (sensor, sample) in &frame.samples {
            let Some(filter) = self.filters.get_mut(sensor.as_str()) else {
                continue;
            };

            let dt = match self.last_ts.insert(sensor.clone(), sample.timestamp_us) {
                Some(prev) => {
                    let delta = sample.timestamp_us.wrapping_sub(prev);
                    if delta == 0 || delta > u32::MAX / 2 {
                        self.nominal_dt
                    } else {
                        delta as f64 / 1e6
                    }
                }
                None => self.nominal_dt,
            };

            let mag = sample.mag.or_else(|| self.latest_mag.get(sensor.as_str()).copied());
            filter.update(dt, sample.gyro, sample.accel, mag);
        }
    }

    fn assemble_motion(&mut self, frame: &SyncFrame) -> MotionFrame {
        let mut segments = HashMap::new();
        for (sensor, sample) in &frame.samples {
            let Some(segment) = self.segment_of.get(sensor.as_str()).copied() else {
                continue;
            };
            let Some(filter) = self.filters.get(sensor.as_str()) else {
                continue;
            };

            let entry = self.tares.entries.entry(segment).or_default();
            let pose = TarePipeline::apply(entry, filter.quat());
            let status = filter.status();

            segments.insert(
                segment,
                contracts::SegmentPose {
                    quat_world: pose.quat_world,
                    rest: status.rest,
                    external_accel: status.external_accel,
                    mag_disturbed: status.mag_disturbed,
                    heading_uncertainty_deg: status.heading_uncertainty_deg,
                    invalid_input: !pose.valid || !sample.is_finite(),
                },
            );
        }

        let mut joints = HashMap::new();
        for joint in contracts::Joint::ALL {
            let (parent, child) = joint.segments();
            let (Some(p), Some(c)) = (segments.get(&parent), segments.get(&child)) else {
                continue;
            };
            let tare = self
                .tares
                .entry(child)
                .map(|e| e.joint_tare)
                .unwrap_or_default();
            joints.insert(joint, decompose_joint(joint, p.quat_world, c.quat_world, tare));
        }

        MotionFrame {
            frame_number: frame.frame_number,
            timestamp_us: frame.timestamp_us,
            segments,
            joints,
            meta: self.engine.meta(),
        }
    }

    // ===== Magnetometer =====

    /// Start a one-shot hard/soft-iron calibration run.
    pub fn start_mag_calibration(&mut self, sensor: SensorId) -> Result<(), PipelineError> {
        if !self.filters.contains_key(sensor.as_str()) {
            return Err(PipelineError::UnknownSensor {
                sensor_id: sensor.to_string(),
            });
        }
        self.mag_runs.start(sensor);
        Ok(())
    }

    /// Push a raw magnetometer reading (µT). Routed to an active calibration
    /// run when one exists, and retained as the sensor's current field for
    /// the fusion heading path either way.
    pub fn add_mag_sample(&mut self, sensor: &SensorId, raw: Vec3) {
        if !raw.is_finite() {
            return;
        }
        self.mag_runs.add_sample(sensor.as_str(), raw);
        self.latest_mag.insert(sensor.clone(), raw);
    }

    /// Collection progress (samples, sphere coverage) of an active run.
    pub fn mag_calibration_progress(&self, sensor: &str) -> Option<(usize, f64)> {
        self.mag_runs.progress(sensor)
    }

    /// Fit the active run. Valid records are installed into the sensor's
    /// filter; invalid ones are returned for diagnostics but never applied.
    pub fn finish_mag_calibration(
        &mut self,
        sensor: &SensorId,
    ) -> Result<MagCalRecord, PipelineError> {
        let record = self.mag_runs.finish(sensor, self.clock_us)?;
        if record.valid {
            if let Some(filter) = self.filters.get_mut(sensor.as_str()) {
                filter.set_mag_calibration(record.clone());
            }
            self.mag_records.insert(sensor.clone(), record.clone());
        } else {
            warn!(sensor_id = %sensor, message = %record.message, "mag calibration not applied");
        }
        Ok(record)
    }

    /// Reload a persisted calibration record.
    pub fn load_mag_calibration(
        &mut self,
        sensor: &SensorId,
        record: MagCalRecord,
    ) -> Result<(), PipelineError> {
        if !record.valid {
            return Err(PipelineError::calibration_invalid(
                sensor.as_str(),
                record.message,
            ));
        }
        if let Some(filter) = self.filters.get_mut(sensor.as_str()) {
            filter.set_mag_calibration(record.clone());
        }
        self.mag_records.insert(sensor.clone(), record);
        Ok(())
    }

    pub fn set_mag_enabled(&mut self, enabled: bool) {
        for filter in self.filters.values_mut() {
            filter.set_mag_enabled(enabled);
        }
    }

    pub fn set_local_magnetic_field(&mut self, magnitude_ut: f64, dip_deg: f64) {
        let field = LocalMagneticField {
            magnitude_ut,
            dip_deg,
        };
        for filter in self.filters.values_mut() {
            filter.set_local_field(field);
        }
    }

    // ===== Taring =====

    /// Level-1 capture for body segments with a known target pose. With
    /// `samples`, the capture averages the still window and refuses when
    /// the segment was moving.
    pub fn capture_mounting_tare(
        &mut self,
        segment: Segment,
        sensor_q: Quat,
        target_q: Quat,
        samples: Option<&[Quat]>,
    ) -> Result<(), PipelineError> {
        let tare = match samples {
            Some(window) if !window.is_empty() => capture_mounting_robust(window, target_q)?,
            _ => capture_mounting_single(sensor_q, target_q),
        };
        let clock = self.clock_us.max(1);
        let entry = self.tares.entry_mut(segment);
        entry.mounting_tare = tare;
        entry.frame_alignment = None;
        entry.mounting_captured_us = clock;
        info!(segment = %segment, "mounting tare captured");
        Ok(())
    }

    /// Level-1 capture for two-layer segments (head): a cued-motion gyro
    /// window provides the functional axis, the start pose provides the
    /// boresight, and gravity completes the anatomical basis.
    pub fn capture_two_layer_mounting(
        &mut self,
        segment: Segment,
        sensor_q_start: Quat,
        gyro_window: &[Vec3],
        accel_at_start: Vec3,
    ) -> Result<f64, PipelineError> {
        let window: Vec<Vector3<f64>> = gyro_window.iter().map(|g| to_vector(*g)).collect();
        let estimate = functional_axis(&window, self.blueprint.session.sample_rate_hz, 6.0)
            .ok_or_else(|| {
                PipelineError::calibration_invalid(segment.to_string(), "cued-motion window too short")
            })?;
        if !estimate.is_confident() {
            warn!(
                segment = %segment,
                confidence = estimate.confidence,
                "functional axis confidence is low"
            );
        }

        let alignment = anatomical_alignment(estimate.axis, to_vector(accel_at_start))
            .ok_or_else(|| {
                PipelineError::calibration_invalid(
                    segment.to_string(),
                    "functional axis is parallel to gravity",
                )
            })?;

        let (mounting, frame_alignment) = capture_mounting_two_layer(sensor_q_start, alignment);
        let clock = self.clock_us.max(1);
        let entry = self.tares.entry_mut(segment);
        entry.mounting_tare = mounting;
        entry.frame_alignment = Some(frame_alignment);
        entry.mounting_captured_us = clock;
        info!(segment = %segment, confidence = estimate.confidence, "two-layer mounting captured");
        Ok(estimate.confidence)
    }

    /// Level-2 capture for one segment.
    pub fn capture_heading_tare(&mut self, segment: Segment, bone_q: Quat) {
        let clock = self.clock_us.max(1);
        let entry = self.tares.entry_mut(segment);
        entry.heading_tare = compute_heading_tare(bone_q);
        entry.heading_captured_us = clock;
    }

    /// Global heading tare: one yaw from a reference segment (pelvis when
    /// present), assigned to every listed segment so all segments share a
    /// world frame.
    pub fn capture_global_heading_tare(&mut self, bone_poses: &HashMap<Segment, Quat>) {
        let reference = if bone_poses.contains_key(&Segment::Pelvis) {
            Segment::Pelvis
        } else {
            match bone_poses.keys().next() {
                Some(segment) => *segment,
                None => return,
            }
        };
        let tare = compute_heading_tare(bone_poses[&reference]);
        let clock = self.clock_us.max(1);
        for segment in bone_poses.keys() {
            let entry = self.tares.entry_mut(*segment);
            entry.heading_tare = tare;
            entry.heading_captured_us = clock;
        }
        info!(reference = %reference, segments = bone_poses.len(), "global heading tare captured");
    }

    /// Level-3 capture: current joint angles become the neutral.
    pub fn capture_joint_tare(&mut self, segment: Segment, angles: JointAngles) {
        let clock = self.clock_us.max(1);
        let entry = self.tares.entry_mut(segment);
        entry.joint_tare = angles;
        entry.joint_captured_us = clock;
    }

    /// Clear a tare level on every segment.
    pub fn reset_tare(&mut self, level: TareLevel) {
        self.tares.reset_all(level);
    }

    /// Serialize the tare store (persistence format).
    pub fn serialize_tares(&self) -> Result<String, PipelineError> {
        serde_json::to_string_pretty(&self.tares).map_err(|e| PipelineError::RecordParse {
            what: "tare store".to_string(),
            message: e.to_string(),
        })
    }

    /// Restore a persisted tare store.
    pub fn deserialize_tares(&mut self, json: &str) -> Result<(), PipelineError> {
        self.tares = serde_json::from_str(json).map_err(|e| PipelineError::RecordParse {
            what: "tare store".to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    pub fn tares(&self) -> &TareStore {
        &self.tares
    }

    // ===== Reset =====

    /// Reset one sensor's fusion state.
    pub fn reset_sensor(&mut self, sensor: &str) -> Result<(), PipelineError> {
        match self.filters.get_mut(sensor) {
            Some(filter) => {
                filter.reset();
                Ok(())
            }
            None => Err(PipelineError::UnknownSensor {
                sensor_id: sensor.to_string(),
            }),
        }
    }

    /// Cancel the session: all pipeline state resets, nothing partial
    /// survives.
    pub fn reset(&mut self) {
        self.engine.reset();
        self.decoder.reset();
        for filter in self.filters.values_mut() {
            filter.reset();
        }
        self.last_ts.clear();
        self.latest_mag.clear();
        self.out.clear();
        self.clock_anchor = None;
        info!("session reset");
    }

    /// Segment a sensor is mounted on.
    pub fn segment_for(&self, sensor: &str) -> Option<Segment> {
        self.segment_of.get(sensor).copied()
    }

    /// Sensor mounted on a segment.
    pub fn sensor_for(&self, segment: Segment) -> Option<&SensorId> {
        self.sensor_of.get(&segment)
    }
}

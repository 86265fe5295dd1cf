//! RawSample / SampleBatch - Ingestion output
//!
//! One decoded wire packet becomes one `SampleBatch`; each per-sensor record
//! inside it becomes one `RawSample` stamped with the packet's beacon clock.

use serde::{Deserialize, Serialize};

use crate::{Quat, SensorId, Vec3};

/// Per-record flag bits from the wire format.
pub mod sample_flags {
    /// Firmware marked the record (and its fused quaternion) as valid.
    pub const VALID: u8 = 0x01;
}

/// A single decoded IMU sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSample {
    /// Resolved sensor identity (blueprint name or synthesized from wire id)
    pub sensor_id: SensorId,

    /// Wire address the record arrived under
    pub wire_id: u8,

    /// Node (receiver) the packet came from
    pub node_id: u16,

    /// Per-node packet sequence number
    pub frame_number: u32,

    /// Beacon-derived sensor clock (µs, wraps at u32::MAX)
    pub timestamp_us: u32,

    /// Firmware-fused orientation, present only when the valid flag is set
    pub quat: Option<Quat>,

    /// Accelerometer (m/s²)
    pub accel: Vec3,

    /// Gyroscope (rad/s)
    pub gyro: Vec3,

    /// Magnetometer (µT); the sync-frame wire record carries none, so this is
    /// populated out-of-band by the session
    pub mag: Option<Vec3>,

    /// Raw flag byte
    pub flags: u8,
}

impl RawSample {
    /// True when every numeric field the pipeline consumes is finite.
    pub fn is_finite(&self) -> bool {
        self.accel.is_finite()
            && self.gyro.is_finite()
            && self.quat.map_or(true, |q| q.is_finite())
            && self.mag.map_or(true, |m| m.is_finite())
    }

    pub fn firmware_valid(&self) -> bool {
        self.flags & sample_flags::VALID != 0
    }
}

/// All samples decoded from one wire packet.
///
/// The jitter buffer orders these by `frame_number` within their node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleBatch {
    pub node_id: u16,
    pub frame_number: u32,
    pub timestamp_us: u32,
    pub samples: Vec<RawSample>,
}

impl SampleBatch {
    pub fn sensor_count(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawSample {
        RawSample {
            sensor_id: "pelvis_imu".into(),
            wire_id: 1,
            node_id: 0,
            frame_number: 7,
            timestamp_us: 35_000,
            quat: Some(Quat::IDENTITY),
            accel: Vec3::new(0.0, 9.81, 0.0),
            gyro: Vec3::default(),
            mag: None,
            flags: sample_flags::VALID,
        }
    }

    #[test]
    fn test_finite_sample() {
        assert!(sample().is_finite());

        let mut bad = sample();
        bad.gyro = Vec3::new(f64::NAN, 0.0, 0.0);
        assert!(!bad.is_finite());
    }

    #[test]
    fn test_firmware_valid_flag() {
        let mut s = sample();
        assert!(s.firmware_valid());
        s.flags = 0;
        assert!(!s.firmware_valid());
    }
}

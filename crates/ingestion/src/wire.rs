//! Sync-frame wire codec (bit-exact, little-endian).
//!
//! Packet layout:
//!
//! ```text
//! Header (10 bytes):
//!   [0]     u8   packet_type = 0x25
//!   [1..5]  u32  frame_number
//!   [5..9]  u32  timestamp_us (beacon-derived)
//!   [9]     u8   sensor_count N
//!
//! Record, N times (24 bytes each):
//!   [0]       u8     sensor_id
//!   [1..9]    i16x4  quaternion (w,x,y,z), scale 16384
//!   [9..15]   i16x3  accel (x,y,z), scale 100 (m/s²)
//!   [15..21]  i16x3  gyro (x,y,z), scale 900 (rad/s)
//!   [21]      u8     flags (bit0 = valid)
//!   [22..24]  u16    reserved (0)
//! ```
//!
//! Packet length must equal `10 + 24·N`; mismatched packets are rejected
//! whole.

use std::collections::HashMap;

use contracts::{sample_flags, Quat, RawSample, SampleBatch, SensorId, Vec3};

use crate::error::IngestionError;

/// Sync-frame packet type byte.
pub const SYNC_FRAME_TYPE: u8 = 0x25;

/// Header length in bytes.
pub const HEADER_LEN: usize = 10;

/// Per-sensor record length in bytes.
pub const RECORD_LEN: usize = 24;

/// Largest fleet a packet may declare. Counts outside [1, MAX] mark a bogus
/// header, which matters for stream resync: waiting for a 255-sensor packet
/// that will never complete would stall the connection.
pub const MAX_SENSOR_COUNT: u8 = 32;

const QUAT_SCALE: f64 = 16384.0;
const ACCEL_SCALE: f64 = 100.0;
const GYRO_SCALE: f64 = 900.0;

/// Wire-address → sensor-name resolution, built from the session blueprint.
///
/// Addresses without a configured name get a synthesized `imu-NN` id so the
/// assembler can still count them as unknown sensors instead of the decoder
/// dropping data.
#[derive(Debug, Clone, Default)]
pub struct WireIdMap {
    names: HashMap<u8, SensorId>,
}

impl WireIdMap {
    pub fn new(names: HashMap<u8, SensorId>) -> Self {
        Self { names }
    }

    pub fn insert(&mut self, wire_id: u8, name: SensorId) {
        self.names.insert(wire_id, name);
    }

    pub fn resolve(&self, wire_id: u8) -> SensorId {
        self.names
            .get(&wire_id)
            .cloned()
            .unwrap_or_else(|| SensorId::from_wire(wire_id))
    }
}

#[inline]
fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[inline]
fn read_i16(bytes: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([bytes[at], bytes[at + 1]])
}

/// Expected total packet length for a given record count.
pub fn packet_len(sensor_count: u8) -> usize {
    HEADER_LEN + RECORD_LEN * sensor_count as usize
}

/// Decode one complete packet. The whole packet is rejected on any mismatch.
pub fn decode_packet(
    bytes: &[u8],
    node_id: u16,
    ids: &WireIdMap,
) -> Result<SampleBatch, IngestionError> {
    if bytes.len() < HEADER_LEN {
        return Err(IngestionError::rejected("packet shorter than header"));
    }
    if bytes[0] != SYNC_FRAME_TYPE {
        return Err(IngestionError::rejected(format!(
            "unexpected packet type 0x{:02x}",
            bytes[0]
        )));
    }

    let frame_number = read_u32(bytes, 1);
    let timestamp_us = read_u32(bytes, 5);
    let sensor_count = bytes[9];

    if sensor_count == 0 || sensor_count > MAX_SENSOR_COUNT {
        return Err(IngestionError::rejected(format!(
            "implausible sensor count {sensor_count}"
        )));
    }

    let expected = packet_len(sensor_count);
    if bytes.len() != expected {
        return Err(IngestionError::rejected(format!(
            "declared {} sensors ({expected} bytes) but payload is {} bytes",
            sensor_count,
            bytes.len()
        )));
    }

    let mut samples = Vec::with_capacity(sensor_count as usize);
    for i in 0..sensor_count as usize {
        let at = HEADER_LEN + i * RECORD_LEN;
        let record = &bytes[at..at + RECORD_LEN];

        let wire_id = record[0];
        let flags = record[21];

        let quat = Quat::new(
            read_i16(record, 1) as f64 / QUAT_SCALE,
            read_i16(record, 3) as f64 / QUAT_SCALE,
            read_i16(record, 5) as f64 / QUAT_SCALE,
            read_i16(record, 7) as f64 / QUAT_SCALE,
        );
        // An unset valid flag or an all-zero quaternion means the firmware
        // fused nothing for this record.
        let quat = if flags & sample_flags::VALID != 0 && quat.norm() > 0.5 {
            Some(quat)
        } else {
            None
        };

        samples.push(RawSample {
            sensor_id: ids.resolve(wire_id),
            wire_id,
            node_id,
            frame_number,
            timestamp_us,
            quat,
            accel: Vec3::new(
                read_i16(record, 9) as f64 / ACCEL_SCALE,
                read_i16(record, 11) as f64 / ACCEL_SCALE,
                read_i16(record, 13) as f64 / ACCEL_SCALE,
            ),
            gyro: Vec3::new(
                read_i16(record, 15) as f64 / GYRO_SCALE,
                read_i16(record, 17) as f64 / GYRO_SCALE,
                read_i16(record, 19) as f64 / GYRO_SCALE,
            ),
            mag: None,
            flags,
        });
    }

    Ok(SampleBatch {
        node_id,
        frame_number,
        timestamp_us,
        samples,
    })
}

/// Fixed-point encode with saturation.
#[inline]
fn to_i16(value: f64, scale: f64) -> i16 {
    (value * scale).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Encode a packet (mock fleet and tests; the inverse of [`decode_packet`]).
pub fn encode_packet(
    frame_number: u32,
    timestamp_us: u32,
    records: &[(u8, Option<Quat>, Vec3, Vec3)],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(packet_len(records.len() as u8));
    out.push(SYNC_FRAME_TYPE);
    out.extend_from_slice(&frame_number.to_le_bytes());
    out.extend_from_slice(&timestamp_us.to_le_bytes());
    out.push(records.len() as u8);

    for (wire_id, quat, accel, gyro) in records {
        out.push(*wire_id);
        let q = quat.unwrap_or(Quat::new(0.0, 0.0, 0.0, 0.0));
        for v in q.as_array() {
            out.extend_from_slice(&to_i16(v, QUAT_SCALE).to_le_bytes());
        }
        for v in accel.as_array() {
            out.extend_from_slice(&to_i16(v, ACCEL_SCALE).to_le_bytes());
        }
        for v in gyro.as_array() {
            out.extend_from_slice(&to_i16(v, GYRO_SCALE).to_le_bytes());
        }
        out.push(if quat.is_some() { sample_flags::VALID } else { 0 });
        out.extend_from_slice(&0u16.to_le_bytes());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_record_packet() -> Vec<u8> {
        encode_packet(
            42,
            5_000,
            &[(
                3,
                Some(Quat::IDENTITY),
                Vec3::new(0.0, 9.81, 0.0),
                Vec3::new(0.1, -0.2, 0.3),
            )],
        )
    }

    #[test]
    fn test_packet_length() {
        let packet = one_record_packet();
        assert_eq!(packet.len(), 34);
        assert_eq!(packet[0], SYNC_FRAME_TYPE);
    }

    #[test]
    fn test_decode_roundtrip() {
        let packet = one_record_packet();
        let batch = decode_packet(&packet, 7, &WireIdMap::default()).unwrap();

        assert_eq!(batch.frame_number, 42);
        assert_eq!(batch.timestamp_us, 5_000);
        assert_eq!(batch.node_id, 7);
        assert_eq!(batch.samples.len(), 1);

        let s = &batch.samples[0];
        assert_eq!(s.wire_id, 3);
        assert_eq!(s.sensor_id, "imu-03");
        assert!(s.quat.is_some());
        assert!((s.accel.y - 9.81).abs() < 0.005);
        assert!((s.gyro.z - 0.3).abs() < 1.0 / 900.0);
        assert!(s.mag.is_none());
    }

    #[test]
    fn test_wire_id_resolution() {
        let mut ids = WireIdMap::default();
        ids.insert(3, "pelvis_imu".into());
        let batch = decode_packet(&one_record_packet(), 0, &ids).unwrap();
        assert_eq!(batch.samples[0].sensor_id, "pelvis_imu");
    }

    #[test]
    fn test_reject_wrong_type_byte() {
        let mut packet = one_record_packet();
        packet[0] = 0x11;
        assert!(decode_packet(&packet, 0, &WireIdMap::default()).is_err());
    }

    #[test]
    fn test_reject_size_mismatch() {
        let mut packet = one_record_packet();
        packet.pop();
        assert!(decode_packet(&packet, 0, &WireIdMap::default()).is_err());

        let mut long = one_record_packet();
        long.push(0);
        assert!(decode_packet(&long, 0, &WireIdMap::default()).is_err());
    }

    #[test]
    fn test_reject_implausible_sensor_count() {
        let mut packet = one_record_packet();
        packet[9] = 0;
        assert!(decode_packet(&packet[..HEADER_LEN], 0, &WireIdMap::default()).is_err());
    }

    #[test]
    fn test_invalid_flag_clears_quat() {
        let packet = encode_packet(
            1,
            0,
            &[(1, None, Vec3::new(0.0, 9.81, 0.0), Vec3::default())],
        );
        let batch = decode_packet(&packet, 0, &WireIdMap::default()).unwrap();
        assert!(batch.samples[0].quat.is_none());
        assert!(!batch.samples[0].firmware_valid());
    }

    #[test]
    fn test_quantization_is_within_scale() {
        let packet = encode_packet(
            1,
            0,
            &[(
                1,
                Some(Quat::new(0.7071, 0.7071, 0.0, 0.0)),
                Vec3::new(-12.34, 0.01, 99.99),
                Vec3::new(3.1415, -3.1415, 0.0005),
            )],
        );
        let batch = decode_packet(&packet, 0, &WireIdMap::default()).unwrap();
        let s = &batch.samples[0];
        let q = s.quat.unwrap();
        assert!((q.w - 0.7071).abs() < 1.0 / QUAT_SCALE);
        assert!((s.accel.x + 12.34).abs() <= 0.5 / ACCEL_SCALE);
        assert!((s.gyro.x - 3.1415).abs() <= 0.5 / GYRO_SCALE);
    }
}

//! Mock sensor fleet
//!
//! For testing and demos without hardware. Emits bit-exact sync-frame wire
//! packets for a configurable fleet at a fixed rate, with optional frame
//! loss and per-packet timestamp skew injection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use contracts::{Quat, Vec3};
use tracing::debug;

use crate::source::{ByteCallback, TransportSource};
use crate::wire;

/// One simulated sensor of the fleet.
#[derive(Debug, Clone)]
pub struct MockSensorSpec {
    /// Wire address
    pub wire_id: u8,

    /// Constant accelerometer reading (m/s²); default is flat at rest
    pub accel: Vec3,

    /// Constant gyroscope reading (rad/s)
    pub gyro: Vec3,

    /// Firmware-fused quaternion to stamp, if any
    pub quat: Option<Quat>,
}

impl MockSensorSpec {
    /// A sensor lying flat and at rest.
    pub fn flat(wire_id: u8) -> Self {
        Self {
            wire_id,
            accel: Vec3::new(0.0, 9.81, 0.0),
            gyro: Vec3::default(),
            quat: Some(Quat::IDENTITY),
        }
    }
}

/// Mock fleet configuration.
#[derive(Debug, Clone)]
pub struct MockFleetConfig {
    /// Node id stamped on produced batches
    pub node_id: u16,

    /// Fleet members
    pub sensors: Vec<MockSensorSpec>,

    /// Packet rate (Hz)
    pub rate_hz: f64,

    /// Beacon clock step per frame (µs)
    pub timestamp_step_us: u32,

    /// Frames to suppress entirely (loss injection)
    pub drop_frames: Vec<u32>,

    /// Constant timestamp skew added to every packet (µs)
    pub timestamp_skew_us: u32,

    /// Stop after this many frames (None = until stopped)
    pub max_frames: Option<u32>,
}

impl Default for MockFleetConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            sensors: vec![MockSensorSpec::flat(1), MockSensorSpec::flat(2)],
            rate_hz: 60.0,
            timestamp_step_us: 16_667,
            drop_frames: Vec::new(),
            timestamp_skew_us: 0,
            max_frames: None,
        }
    }
}

/// Mock sensor fleet source.
///
/// Packet content is a pure function of the frame index, so tests can also
/// call [`MockFleet::packet_for_frame`] directly without threads.
pub struct MockFleet {
    config: MockFleetConfig,
    running: Arc<AtomicBool>,
    callback: Arc<Mutex<Option<ByteCallback>>>,
}

impl MockFleet {
    pub fn new(config: MockFleetConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            callback: Arc::new(Mutex::new(None)),
        }
    }

    /// The wire bytes the fleet emits for a given frame index.
    pub fn packet_for_frame(config: &MockFleetConfig, frame: u32) -> Bytes {
        let records: Vec<(u8, Option<Quat>, Vec3, Vec3)> = config
            .sensors
            .iter()
            .map(|s| (s.wire_id, s.quat, s.accel, s.gyro))
            .collect();
        let timestamp = frame
            .wrapping_mul(config.timestamp_step_us)
            .wrapping_add(config.timestamp_skew_us);
        Bytes::from(wire::encode_packet(frame, timestamp, &records))
    }
}

impl TransportSource for MockFleet {
    fn node_id(&self) -> u16 {
        self.config.node_id
    }

    fn listen(&self, callback: ByteCallback) {
        if self.running.swap(true, Ordering::SeqCst) {
            // Already listening; keep the original callback.
            return;
        }
        *self.callback.lock().unwrap() = Some(callback);

        let config = self.config.clone();
        let running = self.running.clone();
        let callback = self.callback.clone();

        thread::spawn(move || {
            let interval = Duration::from_secs_f64(1.0 / config.rate_hz);
            let mut frame: u32 = 0;

            debug!(
                node_id = config.node_id,
                sensors = config.sensors.len(),
                rate_hz = config.rate_hz,
                "mock fleet started"
            );

            while running.load(Ordering::Relaxed) {
                if let Some(max) = config.max_frames {
                    if frame >= max {
                        break;
                    }
                }

                if !config.drop_frames.contains(&frame) {
                    let bytes = MockFleet::packet_for_frame(&config, frame);
                    if let Some(cb) = callback.lock().unwrap().as_ref() {
                        cb(bytes);
                    }
                }

                frame = frame.wrapping_add(1);
                thread::sleep(interval);
            }

            running.store(false, Ordering::SeqCst);
            debug!(node_id = config.node_id, frames = frame, "mock fleet stopped");
        });
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

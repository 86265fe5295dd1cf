//! SessionBlueprint - Config Loader output
//!
//! Describes a complete capture session: the sensor fleet and its segment
//! mapping, sync policy, fusion tuning, local magnetic field, output routing.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    AssemblerConfig, DisturbanceConfig, FusionConfig, JitterConfig, LocalMagneticField,
    MagCalConfig, Segment, SensorId, SinkConfig, SyncEngineConfig,
};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete session configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SessionBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Session-wide settings
    #[validate(nested)]
    pub session: SessionConfig,

    /// Sensor fleet definition
    #[validate(nested)]
    pub sensors: Vec<SensorMapping>,

    /// Sync policy
    #[serde(default)]
    pub sync: SyncTuning,

    /// Fusion tuning
    #[serde(default)]
    pub fusion: FusionConfig,

    /// Magnetic environment
    #[serde(default)]
    pub magnetic: MagneticConfig,

    /// Output routing configuration
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Session-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SessionConfig {
    /// Human-readable session name
    #[validate(length(min = 1, message = "session name cannot be empty"))]
    pub name: String,

    /// Nominal fleet sample rate (Hz)
    #[serde(default = "default_sample_rate")]
    #[validate(range(exclusive_min = 0.0, max = 1000.0, message = "sample_rate_hz must be in (0, 1000]"))]
    pub sample_rate_hz: f64,

    /// Receiver node id packets are attributed to when the transport does
    /// not tag them
    #[serde(default)]
    pub default_node_id: u16,
}

fn default_sample_rate() -> f64 {
    60.0
}

/// One sensor of the fleet: wire address, name, body segment.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SensorMapping {
    /// Wire address (u8 in the sync-frame record)
    pub wire_id: u8,

    /// Sensor name used throughout the pipeline
    #[validate(length(min = 1, message = "sensor name cannot be empty"))]
    pub name: String,

    /// Body segment this sensor is mounted on
    pub segment: Segment,
}

/// Sync tuning as it appears in the blueprint file.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SyncTuning {
    #[serde(default)]
    pub jitter: JitterConfig,
    #[serde(default)]
    pub assembler: AssemblerConfig,
}

/// Magnetic environment configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MagneticConfig {
    #[serde(default)]
    pub local_field: LocalMagneticField,
    #[serde(default)]
    pub disturbance: DisturbanceConfig,
    #[serde(default)]
    pub calibration: MagCalConfig,
}

impl SessionBlueprint {
    /// Build the sync engine configuration from the declared fleet.
    pub fn to_sync_engine_config(&self) -> SyncEngineConfig {
        SyncEngineConfig {
            expected_sensors: self
                .sensors
                .iter()
                .map(|s| SensorId::from(s.name.as_str()))
                .collect(),
            jitter: self.sync.jitter,
            assembler: self.sync.assembler,
        }
    }

    /// Look up the segment a sensor name is mounted on.
    pub fn segment_for(&self, sensor: &str) -> Option<Segment> {
        self.sensors
            .iter()
            .find(|s| s.name == sensor)
            .map(|s| s.segment)
    }

    /// Look up the sensor name for a wire address.
    pub fn sensor_for_wire(&self, wire_id: u8) -> Option<SensorId> {
        self.sensors
            .iter()
            .find(|s| s.wire_id == wire_id)
            .map(|s| SensorId::from(s.name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blueprint() -> SessionBlueprint {
        SessionBlueprint {
            version: ConfigVersion::V1,
            session: SessionConfig {
                name: "gait-lab".to_string(),
                sample_rate_hz: 60.0,
                default_node_id: 0,
            },
            sensors: vec![
                SensorMapping {
                    wire_id: 1,
                    name: "pelvis_imu".to_string(),
                    segment: Segment::Pelvis,
                },
                SensorMapping {
                    wire_id: 2,
                    name: "thigh_l_imu".to_string(),
                    segment: Segment::ThighLeft,
                },
            ],
            sync: SyncTuning::default(),
            fusion: FusionConfig::default(),
            magnetic: MagneticConfig::default(),
            sinks: vec![],
        }
    }

    #[test]
    fn test_sync_config_from_fleet() {
        let config = blueprint().to_sync_engine_config();
        assert_eq!(config.expected_sensors.len(), 2);
        assert_eq!(config.expected_sensors[0], "pelvis_imu");
    }

    #[test]
    fn test_lookups() {
        let bp = blueprint();
        assert_eq!(bp.segment_for("thigh_l_imu"), Some(Segment::ThighLeft));
        assert_eq!(bp.sensor_for_wire(1).unwrap(), "pelvis_imu");
        assert!(bp.sensor_for_wire(9).is_none());
    }
}

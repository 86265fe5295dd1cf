//! Sync engine configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};

use crate::SensorId;

/// Sync engine configuration: jitter buffer + assembler tuning plus the
/// expected sensor set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEngineConfig {
    /// Sensors a frame must contain to be emitted
    pub expected_sensors: Vec<SensorId>,

    /// Jitter buffer tuning
    #[serde(default)]
    pub jitter: JitterConfig,

    /// Assembler tuning
    #[serde(default)]
    pub assembler: AssemblerConfig,
}

/// Jitter buffer configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JitterConfig {
    /// Head-of-line wait before a timeout release (wall ms)
    pub buffer_delay_ms: u64,

    /// Backward frame_number jump treated as a device reset (smaller jumps
    /// are dropped as duplicates)
    pub reset_threshold: u32,

    /// Batches held per node before the oldest is force-released
    pub max_depth: usize,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            buffer_delay_ms: 40,
            reset_threshold: 500,
            max_depth: 256,
        }
    }
}

/// Assembler configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AssemblerConfig {
    /// Two timestamps within this modular distance share a slot (µs).
    /// Beacon-derived clocks land bit-identical; this only absorbs
    /// arithmetic rounding.
    pub timestamp_tolerance_us: u32,

    /// Buffered-time age at which an incomplete slot expires (µs)
    pub slot_timeout_us: u32,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            timestamp_tolerance_us: 100,
            slot_timeout_us: 50_000,
        }
    }
}

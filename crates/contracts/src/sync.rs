//! SyncFrame - Sync Engine output
//!
//! A time-aligned multi-sensor frame: exactly one sample per expected sensor,
//! all sharing one beacon-derived timestamp.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{RawSample, SensorId};

/// Time-aligned multi-sensor frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFrame {
    /// Largest constituent frame_number (monotone across emissions)
    pub frame_number: u32,

    /// Shared beacon-derived timestamp (µs)
    pub timestamp_us: u32,

    /// Exactly the expected sensor set
    pub samples: HashMap<SensorId, RawSample>,
}

impl SyncFrame {
    /// Maximum pairwise timestamp spread over the constituent samples (µs,
    /// modular). Zero for beacon-derived inputs; the acceptance tests assert
    /// this.
    pub fn timestamp_spread_us(&self) -> u32 {
        let mut min = u32::MAX;
        let mut max = 0u32;
        for s in self.samples.values() {
            min = min.min(s.timestamp_us);
            max = max.max(s.timestamp_us);
        }
        if self.samples.is_empty() {
            0
        } else {
            max.wrapping_sub(min)
        }
    }
}

/// Jitter buffer counters (per node).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JitterStats {
    /// Batches released because they were next in sequence
    pub released_in_sequence: u64,

    /// Batches released by the delay timeout
    pub released_by_timeout: u64,

    /// Small backward jumps discarded as duplicates
    pub dropped_duplicates: u64,

    /// Device resets observed (large backward frame_number jump)
    pub resets: u64,
}

/// Assembler counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AssemblerStats {
    /// Complete frames emitted
    pub emitted: u64,

    /// Slots expired before the expected set completed
    pub incomplete: u64,

    /// Samples from sensors outside the expected set (ignored, not an error)
    pub unknown_sensor: u64,

    /// Same (sensor, timestamp) overwrites (last write wins)
    pub duplicates: u64,
}

/// Combined sync-layer metadata carried on every emitted frame batch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SyncMeta {
    pub jitter: JitterStats,
    pub assembler: AssemblerStats,

    /// Slots currently waiting for sensors
    pub open_slots: usize,

    /// Batches currently held back by the jitter buffer
    pub buffered_batches: usize,
}

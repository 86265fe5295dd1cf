//! Tare records - the persisted calibration state per segment.
//!
//! Capture times are microseconds of session time; 0 means "not captured".

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{JointAngles, Quat, Segment};

/// Which tare layer an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TareLevel {
    /// Level 1: sensor-to-bone mounting offset (+ optional frame alignment)
    Mounting,
    /// Level 2: yaw zeroing
    Heading,
    /// Level 3: joint-angle neutral offset
    Joint,
    /// Everything
    All,
}

/// Per-segment tare entry, the unit of persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TareEntry {
    /// Level 1 offset. Single-pose segments right-multiply it onto the
    /// sensor quaternion; two-layer segments treat it as the inverse start
    /// pose combined with `frame_alignment`.
    #[serde(default)]
    pub mounting_tare: Quat,

    /// PCA-derived axis alignment (two-layer segments only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_alignment: Option<Quat>,

    /// Level 2 yaw offset; applied as `heading_tare⁻¹ · q_bone`
    #[serde(default)]
    pub heading_tare: Quat,

    /// Level 3 neutral joint angles, subtracted from the decomposition
    #[serde(default)]
    pub joint_tare: JointAngles,

    /// Capture times (µs of session time, 0 = not captured)
    #[serde(default)]
    pub mounting_captured_us: u64,
    #[serde(default)]
    pub heading_captured_us: u64,
    #[serde(default)]
    pub joint_captured_us: u64,
}

impl Default for TareEntry {
    fn default() -> Self {
        Self {
            mounting_tare: Quat::IDENTITY,
            frame_alignment: None,
            heading_tare: Quat::IDENTITY,
            joint_tare: JointAngles::default(),
            mounting_captured_us: 0,
            heading_captured_us: 0,
            joint_captured_us: 0,
        }
    }
}

impl TareEntry {
    pub fn has_mounting(&self) -> bool {
        self.mounting_captured_us != 0
    }

    pub fn has_heading(&self) -> bool {
        self.heading_captured_us != 0
    }

    pub fn has_joint(&self) -> bool {
        self.joint_captured_us != 0
    }

    /// Clear one level (or all) back to identity.
    pub fn reset(&mut self, level: TareLevel) {
        match level {
            TareLevel::Mounting => {
                self.mounting_tare = Quat::IDENTITY;
                self.frame_alignment = None;
                self.mounting_captured_us = 0;
            }
            TareLevel::Heading => {
                self.heading_tare = Quat::IDENTITY;
                self.heading_captured_us = 0;
            }
            TareLevel::Joint => {
                self.joint_tare = JointAngles::default();
                self.joint_captured_us = 0;
            }
            TareLevel::All => *self = Self::default(),
        }
    }
}

/// The serializable collection of all segment tares.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TareStore {
    #[serde(default)]
    pub entries: HashMap<Segment, TareEntry>,
}

impl TareStore {
    pub fn entry(&self, segment: Segment) -> Option<&TareEntry> {
        self.entries.get(&segment)
    }

    pub fn entry_mut(&mut self, segment: Segment) -> &mut TareEntry {
        self.entries.entry(segment).or_default()
    }

    /// Reset one level across every segment.
    pub fn reset_all(&mut self, level: TareLevel) {
        for entry in self.entries.values_mut() {
            entry.reset(level);
        }
    }
}

//! Sync-frame assembler: timestamp slots → complete multi-sensor frames.

use std::collections::{HashMap, HashSet};

use contracts::{AssemblerConfig, AssemblerStats, RawSample, SensorId, SyncFrame};
use tracing::{debug, trace};

/// A per-timestamp bucket awaiting the full expected sensor set.
#[derive(Debug)]
struct Slot {
    timestamp_us: u32,
    samples: HashMap<SensorId, RawSample>,
}

impl Slot {
    fn max_frame_number(&self) -> u32 {
        self.samples
            .values()
            .map(|s| s.frame_number)
            .max()
            .unwrap_or(0)
    }
}

/// Turns an unordered trickle of per-sensor samples into `SyncFrame`s whose
/// samples share one beacon-derived timestamp.
///
/// Two timestamps share a slot iff their modular distance is within the
/// tolerance, so slots survive the u32 wraparound of the beacon clock.
/// Complete slots are emitted oldest-first; a complete slot behind an
/// incomplete one waits until the older slot completes or expires, keeping
/// emission timestamps non-decreasing.
#[derive(Debug)]
pub struct FrameAssembler {
    config: AssemblerConfig,
    expected: HashSet<SensorId>,
    /// Open slots ordered oldest → newest
    slots: Vec<Slot>,
    /// Newest message time observed (µs); drives slot expiry
    newest_ts: Option<u32>,
    stats: AssemblerStats,
}

impl FrameAssembler {
    pub fn new(expected: Vec<SensorId>, config: AssemblerConfig) -> Self {
        Self {
            config,
            expected: expected.into_iter().collect(),
            slots: Vec::new(),
            newest_ts: None,
            stats: AssemblerStats::default(),
        }
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    pub fn open_slots(&self) -> usize {
        self.slots.len()
    }

    /// Forward modular distance from `a` to `b` (how far `b` is ahead).
    #[inline]
    fn ahead(a: u32, b: u32) -> u32 {
        b.wrapping_sub(a)
    }

    /// Place a sample; returns any frames that became emittable.
    pub fn add(&mut self, sample: RawSample) -> Vec<SyncFrame> {
        if !self.expected.contains(sample.sensor_id.as_str()) {
            // Unknown sensor ids are ignored, not an error.
            trace!(sensor_id = %sample.sensor_id, "ignoring unknown sensor");
            self.stats.unknown_sensor += 1;
            return Vec::new();
        }

        let ts = sample.timestamp_us;
        self.newest_ts = Some(match self.newest_ts {
            // Advance only forward (modular); late samples must not rewind
            // the expiry clock.
            Some(newest) if Self::ahead(newest, ts) > u32::MAX / 2 => newest,
            _ => ts,
        });

        let tolerance = self.config.timestamp_tolerance_us;
        match self.slots.iter_mut().find(|s| {
            let d = s.timestamp_us.wrapping_sub(ts).min(ts.wrapping_sub(s.timestamp_us));
            d <= tolerance
        }) {
            Some(slot) => {
                // Duplicate (sensor, timestamp): last write wins.
                if slot.samples.insert(sample.sensor_id.clone(), sample).is_some() {
                    self.stats.duplicates += 1;
                }
            }
            None => {
                let mut samples = HashMap::with_capacity(self.expected.len());
                samples.insert(sample.sensor_id.clone(), sample);
                let slot = Slot {
                    timestamp_us: ts,
                    samples,
                };
                // Keep slots ordered oldest-first by modular position.
                let anchor = self.slots.first().map(|s| s.timestamp_us).unwrap_or(ts);
                let pos = self
                    .slots
                    .partition_point(|s| Self::ahead(anchor, s.timestamp_us) <= Self::ahead(anchor, ts));
                self.slots.insert(pos, slot);
            }
        }

        self.expire_stale();
        self.drain_complete()
    }

    /// Expire slots whose buffered-time age exceeded the slot timeout.
    fn expire_stale(&mut self) {
        let Some(newest) = self.newest_ts else { return };
        let timeout = self.config.slot_timeout_us;
        let stats = &mut self.stats;
        self.slots.retain(|slot| {
            let age = Self::ahead(slot.timestamp_us, newest);
            // Slots "ahead" of the newest message (wrapped distance past the
            // halfway point) are future-dated, never stale.
            let keep = age >= u32::MAX / 2 || age < timeout;
            if !keep {
                debug!(
                    timestamp_us = slot.timestamp_us,
                    have = slot.samples.len(),
                    "slot expired incomplete"
                );
                stats.incomplete += 1;
                metrics::counter!("mocap_assembler_incomplete_total").increment(1);
            }
            keep
        });
    }

    /// Emit complete slots from the oldest end.
    fn drain_complete(&mut self) -> Vec<SyncFrame> {
        let mut out = Vec::new();
        while let Some(slot) = self.slots.first() {
            if slot.samples.len() != self.expected.len() {
                break;
            }
            let slot = self.slots.remove(0);
            self.stats.emitted += 1;
            metrics::counter!("mocap_frames_assembled_total").increment(1);
            out.push(SyncFrame {
                frame_number: slot.max_frame_number(),
                timestamp_us: slot.timestamp_us,
                samples: slot.samples,
            });
        }
        out
    }

    /// Drop every open slot (session reset).
    pub fn clear(&mut self) {
        self.slots.clear();
        self.newest_ts = None;
    }
}

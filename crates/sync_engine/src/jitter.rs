//! Per-node jitter buffer with frame_number-ordered release.

use std::collections::{BTreeMap, VecDeque};

use contracts::{JitterConfig, JitterStats, SampleBatch};
use tracing::{debug, info, trace};

/// Buffer lifecycle. `Empty`/`Filling` release only by timeout; `Steady` is
/// entered by the first sequence release and left only by a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterState {
    /// No batches buffered, no sequence established
    Empty,
    /// Collecting; head release is timeout-driven
    Filling,
    /// In-sequence; on-time batches release with zero added latency
    Steady,
}

/// Delay-bounded reorder buffer for one node's packet stream.
///
/// `add` is non-blocking; `pop` returns every batch whose release condition
/// is met at the supplied monotonic time.
#[derive(Debug)]
pub struct JitterBuffer {
    config: JitterConfig,
    /// Pending batches keyed by frame_number, with arrival time (ms)
    pending: BTreeMap<u32, (SampleBatch, u64)>,
    /// Batches already released but not yet popped
    ready: VecDeque<SampleBatch>,
    /// Next frame_number owed to the consumer
    next_expected: Option<u32>,
    state: JitterState,
    stats: JitterStats,
}

impl JitterBuffer {
    pub fn new(config: JitterConfig) -> Self {
        Self {
            config,
            pending: BTreeMap::new(),
            ready: VecDeque::new(),
            next_expected: None,
            state: JitterState::Empty,
            stats: JitterStats::default(),
        }
    }

    pub fn state(&self) -> JitterState {
        self.state
    }

    pub fn stats(&self) -> JitterStats {
        self.stats
    }

    pub fn depth(&self) -> usize {
        self.pending.len()
    }

    /// Accept a batch. `now_ms` is any monotonic millisecond clock.
    pub fn add(&mut self, batch: SampleBatch, now_ms: u64) {
        let frame = batch.frame_number;

        if let Some(next) = self.next_expected {
            let behind = next.wrapping_sub(frame);
            // `behind` in (0, u32::MAX/2) means the frame precedes the
            // sequence point: either a stale duplicate or a device reset.
            if behind > 0 && behind < u32::MAX / 2 {
                if behind > self.config.reset_threshold {
                    self.handle_reset(frame);
                } else {
                    trace!(frame, next, "dropped stale frame");
                    self.stats.dropped_duplicates += 1;
                    metrics::counter!("mocap_jitter_duplicates_total").increment(1);
                    return;
                }
            }
        }

        // Same frame_number overwrites (last write wins).
        self.pending.insert(frame, (batch, now_ms));
        if self.state == JitterState::Empty {
            self.state = JitterState::Filling;
        }
    }

    /// Release every batch whose condition is met. Call on every `add` and
    /// on a timer tick so timeout releases fire without new input.
    pub fn pop(&mut self, now_ms: u64) -> Vec<SampleBatch> {
        loop {
            let Some((&head, &(_, arrived_ms))) = self.pending.first_key_value() else {
                break;
            };

            let in_sequence = self.next_expected == Some(head);
            let timed_out = now_ms.saturating_sub(arrived_ms) >= self.config.buffer_delay_ms;
            let overflowing = self.pending.len() > self.config.max_depth;

            if in_sequence {
                self.release(head);
                if self.state != JitterState::Steady {
                    debug!(frame = head, "sequence established");
                    self.state = JitterState::Steady;
                }
                self.stats.released_in_sequence += 1;
            } else if timed_out || overflowing {
                // Head waited long enough (or the buffer is past its depth
                // bound): release it and any trailing contiguous run.
                self.release(head);
                self.stats.released_by_timeout += 1;
                metrics::counter!("mocap_jitter_timeout_releases_total").increment(1);
                let mut frame = head;
                while let Some((batch, _)) = self.pending.remove(&frame.wrapping_add(1)) {
                    frame = batch.frame_number;
                    self.next_expected = Some(frame.wrapping_add(1));
                    self.ready.push_back(batch);
                    self.stats.released_in_sequence += 1;
                }
            } else {
                break;
            }
        }

        let mut out = Vec::with_capacity(self.ready.len());
        out.extend(self.ready.drain(..));
        out
    }

    /// All batches currently buffered, in order, regardless of conditions.
    /// Used on session shutdown so nothing is silently discarded.
    pub fn drain(&mut self) -> Vec<SampleBatch> {
        let mut out: Vec<SampleBatch> = self.ready.drain(..).collect();
        let pending = std::mem::take(&mut self.pending);
        out.extend(pending.into_values().map(|(batch, _)| batch));
        self.state = JitterState::Empty;
        out
    }

    fn release(&mut self, frame: u32) {
        if let Some((batch, _)) = self.pending.remove(&frame) {
            self.next_expected = Some(frame.wrapping_add(1));
            self.ready.push_back(batch);
        }
        if self.pending.is_empty() && self.state == JitterState::Filling {
            self.state = JitterState::Empty;
        }
    }

    fn handle_reset(&mut self, new_frame: u32) {
        info!(
            new_frame,
            pending = self.pending.len(),
            "device reset detected, flushing jitter buffer"
        );
        self.stats.resets += 1;
        metrics::counter!("mocap_jitter_resets_total").increment(1);

        // Flush what we were holding (in order) so restart costs no data,
        // then restart sequencing at the new number.
        let pending = std::mem::take(&mut self.pending);
        self.ready.extend(pending.into_values().map(|(batch, _)| batch));
        self.next_expected = None;
        self.state = JitterState::Filling;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(frame: u32) -> SampleBatch {
        SampleBatch {
            node_id: 0,
            frame_number: frame,
            timestamp_us: frame.wrapping_mul(5_000),
            samples: Vec::new(),
        }
    }

    fn buffer() -> JitterBuffer {
        JitterBuffer::new(JitterConfig::default())
    }

    #[test]
    fn test_first_release_is_timeout_driven() {
        let mut buf = buffer();
        buf.add(batch(0), 0);

        assert!(buf.pop(10).is_empty(), "no release before the delay");
        let released = buf.pop(40);
        assert_eq!(released.len(), 1);
        assert_eq!(buf.stats().released_by_timeout, 1);
    }

    #[test]
    fn test_steady_sequence_release_is_immediate() {
        let mut buf = buffer();
        buf.add(batch(0), 0);
        buf.pop(40);

        // Sequence point is now frame 1; on-time frames release at once.
        buf.add(batch(1), 41);
        let released = buf.pop(41);
        assert_eq!(released.len(), 1);
        assert_eq!(buf.state(), JitterState::Steady);
    }

    #[test]
    fn test_out_of_order_reordered() {
        let mut buf = buffer();
        buf.add(batch(0), 0);
        buf.pop(40);
        buf.add(batch(1), 41);
        buf.pop(41);

        buf.add(batch(3), 42);
        assert!(buf.pop(42).is_empty(), "frame 2 still missing");
        buf.add(batch(2), 43);

        let released = buf.pop(43);
        assert_eq!(
            released.iter().map(|b| b.frame_number).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }

    #[test]
    fn test_gap_releases_on_timeout_with_trailing_run() {
        let mut buf = buffer();
        buf.add(batch(0), 0);
        buf.pop(40);
        buf.add(batch(1), 40);
        buf.pop(40);

        // Frame 2 lost; 3..=5 buffered.
        buf.add(batch(3), 50);
        buf.add(batch(4), 51);
        buf.add(batch(5), 52);
        assert!(buf.pop(60).is_empty());

        let released = buf.pop(90);
        assert_eq!(
            released.iter().map(|b| b.frame_number).collect::<Vec<_>>(),
            vec![3, 4, 5]
        );
    }

    #[test]
    fn test_burst_after_silence_stays_in_order() {
        let mut buf = buffer();
        for frame in 0..10 {
            buf.add(batch(frame), frame as u64);
        }
        let mut seen: Vec<u32> = buf.pop(40).iter().map(|b| b.frame_number).collect();

        // 75 ms silence, then the suppressed frames arrive in a burst.
        for frame in 10..25 {
            buf.add(batch(frame), 120);
        }
        seen.extend(buf.pop(120).iter().map(|b| b.frame_number));

        let expected: Vec<u32> = (0..25).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_stale_duplicate_dropped() {
        let mut buf = buffer();
        buf.add(batch(0), 0);
        buf.pop(40);
        buf.add(batch(1), 40);
        buf.pop(40);

        buf.add(batch(1), 45);
        assert!(buf.pop(45).is_empty());
        assert_eq!(buf.stats().dropped_duplicates, 1);
    }

    #[test]
    fn test_pending_duplicate_overwrites() {
        let mut buf = buffer();
        let mut replacement = batch(5);
        replacement.timestamp_us = 999;
        buf.add(batch(5), 0);
        buf.add(replacement, 1);

        let released = buf.pop(40);
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].timestamp_us, 999);
    }

    #[test]
    fn test_device_reset_flushes_and_restarts() {
        let mut buf = buffer();
        buf.add(batch(5_000), 0);
        buf.pop(40);
        assert_eq!(buf.stats().released_by_timeout, 1);

        // Device restarts at frame 0: reset, then frame 0 must come out
        // within one timeout window.
        buf.add(batch(0), 50);
        assert_eq!(buf.stats().resets, 1);
        assert_eq!(buf.state(), JitterState::Filling);

        let released = buf.pop(90);
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].frame_number, 0);
    }

    #[test]
    fn test_reset_does_not_drop_pending() {
        let mut buf = buffer();
        buf.add(batch(1_000), 0);
        buf.pop(40);
        buf.add(batch(1_002), 41); // frame 1001 missing, 1002 held back

        // Jump far back: reset must flush the held frame, not discard it.
        buf.add(batch(0), 43);
        assert_eq!(buf.stats().resets, 1);

        let released = buf.pop(100);
        let frames: Vec<u32> = released.iter().map(|b| b.frame_number).collect();
        assert!(frames.contains(&1_002), "held frame must be flushed, not dropped");
        assert!(frames.contains(&0));
    }

    #[test]
    fn test_depth_bound_forces_release() {
        let mut buf = JitterBuffer::new(JitterConfig {
            buffer_delay_ms: 1_000_000,
            max_depth: 4,
            ..Default::default()
        });
        // Leave a hole at 0 so nothing is in sequence, then overflow.
        for frame in 1..=5 {
            buf.add(batch(frame), 0);
        }
        let released = buf.pop(0);
        assert!(!released.is_empty());
    }
}

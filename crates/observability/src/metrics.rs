//! Motion pipeline metrics collection module
//!
//! Collects and aggregates runtime metrics from emitted `MotionFrame`s.

use contracts::MotionFrame;
use metrics::{counter, gauge, histogram};

/// Record metrics from a MotionFrame
///
/// Call this function each time a frame is produced.
pub fn record_motion_metrics(frame: &MotionFrame) {
    // Frame counter
    counter!("mocap_frames_total").increment(1);

    // Frame number (for detecting frame skips)
    gauge!("mocap_last_frame_number").set(frame.frame_number as f64);

    // Sync-layer health
    let meta = &frame.meta;
    gauge!("mocap_open_slots").set(meta.open_slots as f64);
    gauge!("mocap_buffered_batches").set(meta.buffered_batches as f64);
    gauge!("mocap_slots_incomplete_total").set(meta.assembler.incomplete as f64);
    gauge!("mocap_jitter_resets").set(meta.jitter.resets as f64);

    // Segment fusion status
    for (segment, pose) in &frame.segments {
        gauge!(
            "mocap_heading_uncertainty_deg",
            "segment" => segment.to_string()
        )
        .set(pose.heading_uncertainty_deg);

        if pose.external_accel {
            counter!(
                "mocap_external_accel_total",
                "segment" => segment.to_string()
            )
            .increment(1);
        }
        if pose.mag_disturbed {
            counter!(
                "mocap_mag_disturbed_frames_total",
                "segment" => segment.to_string()
            )
            .increment(1);
        }
    }

    // Joint angles
    for (joint, sample) in &frame.joints {
        histogram!(
            "mocap_joint_flexion_deg",
            "joint" => joint.to_string()
        )
        .record(sample.angles.flexion);

        if !sample.within_physiologic_range {
            counter!(
                "mocap_joint_out_of_range_total",
                "joint" => joint.to_string()
            )
            .increment(1);
        }
    }
}

/// Record decoded batch reception
pub fn record_batch_received(node_id: u16, sensors: usize) {
    counter!(
        "mocap_batches_received_total",
        "node_id" => node_id.to_string()
    )
    .increment(1);
    gauge!("mocap_batch_sensor_count").set(sensors as f64);
}

/// Record pipeline latency (from packet arrival to frame emission)
pub fn record_pipeline_latency_ms(latency_ms: f64) {
    histogram!("mocap_pipeline_latency_ms").record(latency_ms);
}

/// Motion metrics aggregator
///
/// Aggregates metrics in memory for statistics and summary output.
#[derive(Debug, Clone, Default)]
pub struct MotionMetricsAggregator {
    /// Total frames
    pub total_frames: u64,

    /// Frames containing at least one invalid-input segment
    pub frames_with_invalid: u64,

    /// Joint samples outside physiologic range
    pub out_of_range_samples: u64,

    /// Last observed sync counters
    pub last_incomplete: u64,
    pub last_resets: u64,
    pub last_duplicates: u64,

    /// Heading uncertainty statistics (degrees)
    pub heading_stats: RunningStats,

    /// Flexion statistics per joint
    pub flexion_stats: std::collections::HashMap<String, RunningStats>,
}

impl MotionMetricsAggregator {
    /// Create new aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Update aggregate statistics
    pub fn update(&mut self, frame: &MotionFrame) {
        self.total_frames += 1;

        if frame.segments.values().any(|p| p.invalid_input) {
            self.frames_with_invalid += 1;
        }

        for pose in frame.segments.values() {
            self.heading_stats.push(pose.heading_uncertainty_deg);
        }

        for (joint, sample) in &frame.joints {
            if !sample.within_physiologic_range {
                self.out_of_range_samples += 1;
            }
            self.flexion_stats
                .entry(joint.to_string())
                .or_default()
                .push(sample.angles.flexion);
        }

        self.last_incomplete = frame.meta.assembler.incomplete;
        self.last_resets = frame.meta.jitter.resets;
        self.last_duplicates = frame.meta.jitter.dropped_duplicates;
    }

    /// Generate summary report
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames,
            frames_with_invalid: self.frames_with_invalid,
            out_of_range_samples: self.out_of_range_samples,
            incomplete_slots: self.last_incomplete,
            device_resets: self.last_resets,
            dropped_duplicates: self.last_duplicates,
            heading_uncertainty_deg: StatsSummary::from(&self.heading_stats),
            flexion_deg: self
                .flexion_stats
                .iter()
                .map(|(joint, stats)| (joint.clone(), StatsSummary::from(stats)))
                .collect(),
        }
    }

    /// Reset statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub frames_with_invalid: u64,
    pub out_of_range_samples: u64,
    pub incomplete_slots: u64,
    pub device_resets: u64,
    pub dropped_duplicates: u64,
    pub heading_uncertainty_deg: StatsSummary,
    pub flexion_deg: std::collections::HashMap<String, StatsSummary>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Motion Metrics Summary ===")?;
        writeln!(f, "Total frames: {}", self.total_frames)?;
        writeln!(f, "Frames with invalid input: {}", self.frames_with_invalid)?;
        writeln!(f, "Out-of-range joint samples: {}", self.out_of_range_samples)?;
        writeln!(f, "Incomplete slots: {}", self.incomplete_slots)?;
        writeln!(f, "Device resets: {}", self.device_resets)?;
        writeln!(f, "Dropped duplicates: {}", self.dropped_duplicates)?;
        writeln!(f, "Heading uncertainty (deg): {}", self.heading_uncertainty_deg)?;

        if !self.flexion_deg.is_empty() {
            writeln!(f, "Flexion (deg):")?;
            for (joint, stats) in &self.flexion_deg {
                writeln!(f, "  {}: {}", joint, stats)?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics calculator (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add new value
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Current mean
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample standard deviation
    pub fn std_dev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }

    /// Number of values observed
    pub fn count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.push(v);
        }
        assert_eq!(stats.count(), 8);
        assert!((stats.mean() - 5.0).abs() < 1e-9);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        // Sample std of that set is ~2.138
        assert!((stats.std_dev() - 2.138).abs() < 0.01);
    }

    #[test]
    fn test_aggregator_counts_frames() {
        let mut agg = MotionMetricsAggregator::new();
        let frame = MotionFrame {
            frame_number: 1,
            timestamp_us: 16_667,
            segments: HashMap::new(),
            joints: HashMap::new(),
            meta: Default::default(),
        };
        agg.update(&frame);
        agg.update(&frame);

        let summary = agg.summary();
        assert_eq!(summary.total_frames, 2);
        assert_eq!(summary.heading_uncertainty_deg.count, 0);
    }
}

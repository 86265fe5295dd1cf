//! Pipeline statistics and metrics.

use std::time::Duration;

use contracts::SyncMeta;
use observability::MotionMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total motion frames emitted
    pub frames_emitted: u64,

    /// Total decoded batches received from transport
    pub batches_received: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Number of sensors in the fleet
    pub active_sensors: usize,

    /// Number of sinks that received data
    pub active_sinks: usize,

    /// Final sync-layer counters
    pub sync_meta: SyncMeta,

    /// Motion metrics aggregator
    pub motion_metrics: MotionMetricsAggregator,
}

impl PipelineStats {
    /// Calculate frames per second throughput
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames_emitted as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Motion frames: {}", self.frames_emitted);
        println!("   ├─ Batches received: {}", self.batches_received);
        println!("   ├─ FPS: {:.2}", self.fps());
        println!("   ├─ Active sensors: {}", self.active_sensors);
        println!("   └─ Active sinks: {}", self.active_sinks);

        println!("\n📈 Sync Layer");
        println!(
            "   ├─ In-sequence releases: {}",
            self.sync_meta.jitter.released_in_sequence
        );
        println!(
            "   ├─ Timeout releases: {}",
            self.sync_meta.jitter.released_by_timeout
        );
        println!(
            "   ├─ Dropped duplicates: {}",
            self.sync_meta.jitter.dropped_duplicates
        );
        println!("   ├─ Device resets: {}", self.sync_meta.jitter.resets);
        println!(
            "   ├─ Incomplete slots: {}",
            self.sync_meta.assembler.incomplete
        );
        println!(
            "   └─ Unknown-sensor samples: {}",
            self.sync_meta.assembler.unknown_sensor
        );

        println!("\n{}", self.motion_metrics.summary());
    }
}

//! Pipeline orchestrator - coordinates all components.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{MotionFrame, SessionBlueprint};
use ingestion::{IngestionPipeline, MockFleet, MockFleetConfig, MockSensorSpec, WireIdMap};
use observability::record_motion_metrics;
use session::MocapSession;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::PipelineStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The session blueprint configuration
    pub blueprint: SessionBlueprint,

    /// Drive from the simulated fleet instead of a live transport
    pub mock: bool,

    /// Maximum number of motion frames to emit (None = unlimited)
    pub max_frames: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Channel buffer size
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Persisted tare store to preload
    pub tare_json: Option<String>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline to completion
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // ==== Stage 1: Initialize Metrics (optional) ====
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!(port, "Metrics endpoint available");
        }

        // ==== Stage 2: Create Session ====
        let mut mocap = MocapSession::new(blueprint.clone());
        if let Some(ref json) = self.config.tare_json {
            mocap
                .deserialize_tares(json)
                .context("Failed to load persisted tares")?;
            info!("Tare store preloaded");
        }

        // ==== Stage 3: Setup Ingestion ====
        info!("Setting up ingestion pipeline...");
        let mut ids = WireIdMap::default();
        for mapping in &blueprint.sensors {
            ids.insert(mapping.wire_id, mapping.name.as_str().into());
        }
        let mut ingestion = IngestionPipeline::with_ids(self.config.buffer_size, ids);

        if self.config.mock {
            let fleet_config = MockFleetConfig {
                node_id: blueprint.session.default_node_id,
                sensors: blueprint
                    .sensors
                    .iter()
                    .map(|s| MockSensorSpec::flat(s.wire_id))
                    .collect(),
                rate_hz: blueprint.session.sample_rate_hz,
                timestamp_step_us: (1e6 / blueprint.session.sample_rate_hz) as u32,
                ..Default::default()
            };
            ingestion.register_source(Box::new(MockFleet::new(fleet_config)));
            info!(sensors = blueprint.sensors.len(), "Mock fleet registered");
        } else {
            // Live transports register themselves out-of-process and feed
            // the session through its byte surface; nothing to do here yet.
            warn!("No live transport configured; use --mock or feed bytes externally");
        }

        let active_sensors = blueprint.sensors.len();

        // ==== Stage 4: Setup Dispatcher ====
        info!("Setting up dispatcher...");
        let (frame_tx, frame_rx) = mpsc::channel::<MotionFrame>(self.config.buffer_size);

        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - motion frames will be dropped");
        }

        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), frame_rx)
            .await
            .context("Failed to create dispatcher")?;

        let active_sinks = blueprint.sinks.len();
        let dispatcher_handle = dispatcher.spawn();

        info!(active_sinks, "Dispatcher started");

        // ==== Stage 5: Run ====
        info!("Starting transport sources...");
        ingestion.start_all();
        let batch_rx = ingestion
            .take_receiver()
            .context("Failed to get ingestion receiver")?;

        let max_frames = self.config.max_frames;

        let pipeline_task = async move {
            let mut stats = PipelineStats {
                active_sensors,
                active_sinks,
                ..Default::default()
            };
            // Timeout releases need periodic polling even when the
            // transport goes quiet.
            let mut poll = tokio::time::interval(Duration::from_millis(10));

            'run: loop {
                let now_ms = start_time.elapsed().as_millis() as u64;

                tokio::select! {
                    batch = batch_rx.recv() => {
                        match batch {
                            Ok(batch) => {
                                stats.batches_received += 1;
                                observability::record_batch_received(
                                    batch.node_id,
                                    batch.samples.len(),
                                );
                                mocap.push_batch(batch, now_ms);
                            }
                            Err(_) => {
                                info!("Transport channel closed");
                                break 'run;
                            }
                        }
                    }
                    _ = poll.tick() => {}
                }

                for frame in mocap.pop_frames(now_ms) {
                    stats.frames_emitted += 1;
                    record_motion_metrics(&frame);
                    stats.motion_metrics.update(&frame);

                    if frame_tx.send(frame).await.is_err() {
                        warn!("Dispatcher channel closed");
                        break 'run;
                    }

                    if let Some(max) = max_frames {
                        if stats.frames_emitted >= max {
                            info!(frames = stats.frames_emitted, "Reached max frames limit");
                            break 'run;
                        }
                    }
                }
            }

            stats.sync_meta = mocap.sync_meta();
            stats
        };

        // Run with optional timeout
        let stats = if let Some(timeout) = self.config.timeout {
            match tokio::time::timeout(timeout, pipeline_task).await {
                Ok(stats) => stats,
                Err(_) => {
                    warn!(timeout_secs = timeout.as_secs(), "Pipeline timed out");
                    PipelineStats::default()
                }
            }
        } else {
            pipeline_task.await
        };

        // ==== Stage 6: Cleanup ====
        info!("Shutting down pipeline...");
        ingestion.stop_all();

        // Wait for dispatcher to flush
        let _ = tokio::time::timeout(Duration::from_secs(5), dispatcher_handle).await;

        let mut final_stats = stats;
        final_stats.duration = start_time.elapsed();

        info!(
            duration_secs = final_stats.duration.as_secs_f64(),
            fps = format!("{:.2}", final_stats.fps()),
            "Pipeline shutdown complete"
        );

        Ok(final_stats)
    }
}

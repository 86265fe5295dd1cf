//! # Observability
//!
//! Observability module: Tracing + Prometheus metrics for the capture
//! pipeline.
//!
//! ## Features
//!
//! - Tracing initialization (JSON/Pretty/Compact format)
//! - Prometheus export with an optional per-session global label
//! - Help text registration for every `mocap_*` metric family
//! - Motion metrics collection and in-memory aggregation
//!
//! ## Usage Example
//!
//! ```ignore
//! use observability::record_motion_metrics;
//!
//! observability::init_for_session("gait-lab")?;
//!
//! for frame in session.pop_frames(now_ms) {
//!     record_motion_metrics(&frame);
//! }
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Re-exports
pub use crate::metrics::{
    record_batch_received, record_motion_metrics, record_pipeline_latency_ms, MetricsSummary,
    MotionMetricsAggregator, RunningStats, StatsSummary,
};

/// Initialize observability with defaults (JSON logs, Prometheus on 9000,
/// no session label).
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// Initialize with the capture session's name attached as a global
/// `session` label, so recordings from different sessions can be told apart
/// on one scrape endpoint.
pub fn init_for_session(session_name: &str) -> Result<()> {
    init_with_config(ObservabilityConfig {
        session_label: Some(session_name.to_string()),
        ..Default::default()
    })
}

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Log format
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Default log level
    pub default_log_level: String,
    /// Value of the global `session` label (None = unlabeled)
    pub session_label: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: Some(9000),
            default_log_level: "info".to_string(),
            session_label: None,
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logging
    #[default]
    Json,
    /// Human-readable format
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Initialize with custom configuration
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        install_prometheus(port, config.session_label.as_deref())?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        session = config.session_label.as_deref().unwrap_or("-"),
        "Observability initialized"
    );

    Ok(())
}

/// Initialize only Prometheus metrics (without initializing Tracing)
///
/// Used when Tracing is already initialized by another module.
pub fn init_metrics_only(port: u16) -> Result<()> {
    install_prometheus(port, None)
}

fn install_prometheus(port: u16, session: Option<&str>) -> Result<()> {
    let mut builder = PrometheusBuilder::new().with_http_listener(([0, 0, 0, 0], port));
    if let Some(session) = session {
        builder = builder.add_global_label("session", session);
    }
    builder
        .install()
        .context("Failed to install Prometheus recorder")?;

    describe_pipeline_metrics();
    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}

/// Register help text for every metric family the pipeline emits, so the
/// scrape output is self-describing.
pub fn describe_pipeline_metrics() {
    use ::metrics::{describe_counter, describe_gauge, describe_histogram};

    // Ingestion
    describe_counter!(
        "mocap_packets_decoded_total",
        "Sync-frame packets decoded from the wire stream"
    );
    describe_counter!(
        "mocap_packets_rejected_total",
        "Packets rejected whole (bad type byte, size mismatch or bogus header)"
    );
    describe_counter!(
        "mocap_batches_received_total",
        "Decoded batches handed to the sync layer, per node"
    );

    // Sync layer
    describe_counter!(
        "mocap_jitter_timeout_releases_total",
        "Jitter-buffer heads released by the delay timeout instead of in sequence"
    );
    describe_counter!(
        "mocap_jitter_duplicates_total",
        "Stale batches dropped behind the sequence point"
    );
    describe_counter!(
        "mocap_jitter_resets_total",
        "Device resets observed as large backward frame-number jumps"
    );
    describe_counter!(
        "mocap_assembler_incomplete_total",
        "Timestamp slots expired before the expected sensor set completed"
    );
    describe_counter!(
        "mocap_frames_assembled_total",
        "Complete time-aligned sync frames emitted"
    );
    describe_gauge!("mocap_open_slots", "Timestamp slots currently awaiting sensors");
    describe_gauge!(
        "mocap_buffered_batches",
        "Batches currently held back by the jitter buffers"
    );

    // Fusion
    describe_counter!(
        "mocap_fusion_resets_total",
        "Per-sensor fusion resets caused by non-finite input"
    );
    describe_counter!(
        "mocap_fusion_bogus_gyro_total",
        "Gyro samples past the plausibility bound, held out of the integration"
    );
    describe_counter!(
        "mocap_mag_disturbed_total",
        "Ticks on which a magnetic disturbance check fired"
    );
    describe_counter!(
        "mocap_external_accel_total",
        "Frames with tilt correction withheld for external acceleration, per segment"
    );
    describe_counter!(
        "mocap_mag_disturbed_frames_total",
        "Frames with heading correction withheld or down-weighted, per segment"
    );
    describe_gauge!(
        "mocap_heading_uncertainty_deg",
        "Current heading uncertainty per segment (degrees)"
    );

    // Motion output
    describe_counter!("mocap_frames_total", "Motion frames emitted");
    describe_counter!(
        "mocap_motion_frames_total",
        "Motion frames assembled by the session"
    );
    describe_counter!(
        "mocap_joint_range_violations_total",
        "Joint samples outside their declared physiologic range (reported, never clamped)"
    );
    describe_counter!(
        "mocap_joint_out_of_range_total",
        "Dispatched frames containing an out-of-range joint, per joint"
    );
    describe_gauge!("mocap_last_frame_number", "Most recent emitted frame number");
    describe_histogram!(
        "mocap_joint_flexion_deg",
        "Flexion angle distribution per joint (degrees)"
    );
    describe_histogram!(
        "mocap_pipeline_latency_ms",
        "Packet arrival to motion-frame emission latency (milliseconds)"
    );
}

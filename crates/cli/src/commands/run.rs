//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    // Load and parse configuration
    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        session = %blueprint.session.name,
        sample_rate_hz = blueprint.session.sample_rate_hz,
        sensors = blueprint.sensors.len(),
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    // Preload persisted tares if given
    let tare_json = match &args.tares {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read tare store {}", path.display()))?,
        ),
        None => None,
    };

    // Build pipeline configuration
    let pipeline_config = PipelineConfig {
        blueprint,
        mock: args.mock,
        max_frames: if args.max_frames == 0 {
            None
        } else {
            Some(args.max_frames)
        },
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        buffer_size: args.buffer_size,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
        tare_json,
    };

    // Create and run pipeline
    let pipeline = Pipeline::new(pipeline_config);

    // Setup graceful shutdown handler
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting pipeline...");

    // Run pipeline with shutdown signal
    tokio::select! {
        result = pipeline.run() => {
            match result {
                Ok(stats) => {
                    info!(
                        frames_emitted = stats.frames_emitted,
                        batches_received = stats.batches_received,
                        duration_secs = stats.duration.as_secs_f64(),
                        fps = format!("{:.2}", stats.fps()),
                        "Pipeline completed successfully"
                    );

                    // Print detailed statistics
                    stats.print_summary();
                }
                Err(e) => {
                    return Err(e).context("Pipeline execution failed");
                }
            }
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping pipeline...");
        }
    }

    info!("Mocap Syncer finished");
    Ok(())
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::SessionBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Session:");
    println!("  Name: {}", blueprint.session.name);
    println!("  Sample rate: {} Hz", blueprint.session.sample_rate_hz);

    println!("\nSensor fleet ({}):", blueprint.sensors.len());
    for sensor in &blueprint.sensors {
        println!(
            "  - {} (wire {}) on {}",
            sensor.name, sensor.wire_id, sensor.segment
        );
    }

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!("\nSync Settings:");
    println!(
        "  Jitter delay: {} ms, reset threshold: {} frames",
        blueprint.sync.jitter.buffer_delay_ms, blueprint.sync.jitter.reset_threshold
    );
    println!(
        "  Slot tolerance: {} µs, slot timeout: {} µs",
        blueprint.sync.assembler.timestamp_tolerance_us, blueprint.sync.assembler.slot_timeout_us
    );

    println!();
}

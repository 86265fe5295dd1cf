//! Mock Pipeline Demo
//!
//! Drives the full capture pipeline from the simulated sensor fleet:
//! MockFleet -> IngestionPipeline -> MocapSession -> Dispatcher.
//! Runs without any hardware.
//!
//! Run with: cargo run --bin mock_pipeline [session.toml]

use std::collections::HashMap;
use std::time::{Duration, Instant};

use config_loader::ConfigLoader;
use contracts::{
    ConfigVersion, MagneticConfig, MotionFrame, Segment, SensorMapping, SessionBlueprint,
    SessionConfig, SinkConfig, SinkType, SyncTuning,
};
use ingestion::{IngestionPipeline, MockFleet, MockFleetConfig, MockSensorSpec, WireIdMap};
use session::MocapSession;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Mock Pipeline Demo");

    // ==== Stage 1: Use default config or load from file ====
    let blueprint = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading session blueprint");
        ConfigLoader::load_from_path(std::path::Path::new(&path))?
    } else {
        create_demo_blueprint()
    };

    // ==== Stage 2: Setup Ingestion with the mock fleet ====
    tracing::info!("Setting up ingestion pipeline...");
    let mut ids = WireIdMap::default();
    for sensor in &blueprint.sensors {
        ids.insert(sensor.wire_id, sensor.name.as_str().into());
    }
    let mut ingestion = IngestionPipeline::with_ids(100, ids);

    ingestion.register_source(Box::new(MockFleet::new(MockFleetConfig {
        node_id: blueprint.session.default_node_id,
        sensors: blueprint
            .sensors
            .iter()
            .map(|s| MockSensorSpec::flat(s.wire_id))
            .collect(),
        rate_hz: blueprint.session.sample_rate_hz,
        timestamp_step_us: (1e6 / blueprint.session.sample_rate_hz) as u32,
        ..Default::default()
    })));

    tracing::info!(
        sensors = blueprint.sensors.len(),
        rate_hz = blueprint.session.sample_rate_hz,
        "Mock fleet registered"
    );

    // ==== Stage 3: Setup Session ====
    let mut mocap = MocapSession::new(blueprint.clone());

    // ==== Stage 4: Setup Dispatcher ====
    let (frame_tx, frame_rx) = mpsc::channel::<MotionFrame>(100);
    let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), frame_rx).await?;
    let dispatcher_handle = dispatcher.spawn();

    // ==== Stage 5: Run ====
    tracing::info!("Starting pipeline...");
    let batch_rx = ingestion.take_receiver().expect("receiver already taken");
    ingestion.start_all();

    let target_frames = 120u64;
    let start = Instant::now();
    let mut emitted = 0u64;

    'run: while emitted < target_frames {
        let batch = match tokio::time::timeout(Duration::from_secs(2), batch_rx.recv()).await {
            Ok(Ok(batch)) => batch,
            _ => break,
        };

        let now_ms = start.elapsed().as_millis() as u64;
        mocap.push_batch(batch, now_ms);

        for frame in mocap.pop_frames(now_ms) {
            observability::record_motion_metrics(&frame);
            emitted += 1;
            if frame_tx.send(frame).await.is_err() {
                break 'run;
            }
        }
    }

    // ==== Stage 6: Shutdown ====
    tracing::info!(frames = emitted, "Demo target reached, shutting down");
    ingestion.stop_all();
    drop(frame_tx);
    let _ = dispatcher_handle.await;

    let meta = mocap.sync_meta();
    tracing::info!(
        emitted,
        in_sequence = meta.jitter.released_in_sequence,
        by_timeout = meta.jitter.released_by_timeout,
        incomplete = meta.assembler.incomplete,
        "Mock pipeline demo complete"
    );

    Ok(())
}

/// A minimal two-sensor demo session with a log sink.
fn create_demo_blueprint() -> SessionBlueprint {
    SessionBlueprint {
        version: ConfigVersion::V1,
        session: SessionConfig {
            name: "demo".to_string(),
            sample_rate_hz: 60.0,
            default_node_id: 0,
        },
        sensors: vec![
            SensorMapping {
                wire_id: 1,
                name: "pelvis_imu".to_string(),
                segment: Segment::Pelvis,
            },
            SensorMapping {
                wire_id: 2,
                name: "thigh_l_imu".to_string(),
                segment: Segment::ThighLeft,
            },
            SensorMapping {
                wire_id: 3,
                name: "tibia_l_imu".to_string(),
                segment: Segment::TibiaLeft,
            },
        ],
        sync: SyncTuning::default(),
        fusion: Default::default(),
        magnetic: MagneticConfig::default(),
        sinks: vec![SinkConfig {
            name: "demo_log".to_string(),
            sink_type: SinkType::Log,
            queue_capacity: 64,
            params: HashMap::new(),
        }],
    }
}

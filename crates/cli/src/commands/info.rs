//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    session: SessionInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sensors: Vec<SensorInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
    sync: SyncInfo,
}

#[derive(Serialize)]
struct SessionInfo {
    name: String,
    sample_rate_hz: f64,
    default_node_id: u16,
}

#[derive(Serialize)]
struct SensorInfo {
    name: String,
    wire_id: u8,
    segment: String,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
}

#[derive(Serialize)]
struct SyncInfo {
    buffer_delay_ms: u64,
    reset_threshold: u32,
    timestamp_tolerance_us: u32,
    slot_timeout_us: u32,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &contracts::SessionBlueprint, args: &InfoArgs) -> ConfigInfo {
    let sensors = if args.sensors {
        blueprint
            .sensors
            .iter()
            .map(|s| SensorInfo {
                name: s.name.clone(),
                wire_id: s.wire_id,
                segment: s.segment.to_string(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        session: SessionInfo {
            name: blueprint.session.name.clone(),
            sample_rate_hz: blueprint.session.sample_rate_hz,
            default_node_id: blueprint.session.default_node_id,
        },
        sensors,
        sinks,
        sync: SyncInfo {
            buffer_delay_ms: blueprint.sync.jitter.buffer_delay_ms,
            reset_threshold: blueprint.sync.jitter.reset_threshold,
            timestamp_tolerance_us: blueprint.sync.assembler.timestamp_tolerance_us,
            slot_timeout_us: blueprint.sync.assembler.slot_timeout_us,
        },
    }
}

fn print_config_info(blueprint: &contracts::SessionBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Mocap Syncer Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    // Session info
    println!("📍 Session");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Name: {}", blueprint.session.name);
    println!("   ├─ Sample rate: {} Hz", blueprint.session.sample_rate_hz);
    println!("   └─ Default node: {}", blueprint.session.default_node_id);

    // Sensor fleet
    println!("\n🦿 Sensor Fleet ({})", blueprint.sensors.len());
    for (i, sensor) in blueprint.sensors.iter().enumerate() {
        let is_last = i == blueprint.sensors.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };

        if args.sensors {
            println!(
                "   {} {} (wire {:#04x}) → {}",
                prefix, sensor.name, sensor.wire_id, sensor.segment
            );
        } else {
            println!("   {} {}", prefix, sensor.name);
        }
    }

    // Sync settings
    println!("\n⚙️  Sync Settings");
    println!(
        "   ├─ Jitter delay: {} ms",
        blueprint.sync.jitter.buffer_delay_ms
    );
    println!(
        "   ├─ Reset threshold: {} frames",
        blueprint.sync.jitter.reset_threshold
    );
    println!(
        "   ├─ Slot tolerance: {} µs",
        blueprint.sync.assembler.timestamp_tolerance_us
    );
    println!(
        "   └─ Slot timeout: {} µs",
        blueprint.sync.assembler.slot_timeout_us
    );

    // Magnetic environment
    println!("\n🧭 Magnetic Environment");
    println!(
        "   ├─ Expected field: {} µT",
        blueprint.magnetic.local_field.magnitude_ut
    );
    println!("   └─ Dip angle: {}°", blueprint.magnetic.local_field.dip_deg);

    // Sinks
    if args.sinks && !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let is_last = i == blueprint.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);
        }
    }

    println!();
}

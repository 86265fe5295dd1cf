//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Mocap Syncer - wearable IMU motion capture pipeline
#[derive(Parser, Debug)]
#[command(
    name = "mocap-syncer",
    author,
    version,
    about = "Wearable IMU motion capture pipeline",
    long_about = "Host-side motion capture pipeline for wearable IMU fleets.\n\n\
                  Decodes the sync-frame wire stream, reconstructs time-aligned \n\
                  multi-sensor frames, fuses per-sensor orientations, applies the \n\
                  calibration pipeline and dispatches motion frames to configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "MOCAP_SYNCER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "MOCAP_SYNCER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the capture pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "session.toml",
        env = "MOCAP_SYNCER_CONFIG"
    )]
    pub config: PathBuf,

    /// Drive the pipeline from the simulated sensor fleet instead of a
    /// live transport
    #[arg(long, env = "MOCAP_SYNCER_MOCK")]
    pub mock: bool,

    /// Maximum number of motion frames to produce (0 = unlimited)
    #[arg(long, default_value = "0", env = "MOCAP_SYNCER_MAX_FRAMES")]
    pub max_frames: u64,

    /// Pipeline timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "MOCAP_SYNCER_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Channel buffer size for internal queues
    #[arg(long, default_value = "100", env = "MOCAP_SYNCER_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Path to a persisted tare store to preload
    #[arg(long, env = "MOCAP_SYNCER_TARES")]
    pub tares: Option<PathBuf>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "MOCAP_SYNCER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "session.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "session.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show detailed sensor fleet information
    #[arg(long)]
    pub sensors: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

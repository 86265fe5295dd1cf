//! DataSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for Sinks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{MotionFrame, PipelineError};

/// Data output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write a motion frame
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, frame: &MotionFrame) -> Result<(), PipelineError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), PipelineError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), PipelineError>;
}

/// Sink kind selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Per-frame tracing summary
    Log,
    /// JSONL recorder (one MotionFrame per line)
    File,
    /// Length-prefixed bincode frames over TCP (renderer feed)
    Network,
}

/// Sink configuration entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Unique sink name
    pub name: String,

    /// Sink kind
    pub sink_type: SinkType,

    /// Worker queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Kind-specific parameters (e.g. "path", "address")
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    64
}

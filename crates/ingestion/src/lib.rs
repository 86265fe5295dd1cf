//! # Ingestion Pipeline
//!
//! Wire ingestion module.
//!
//! Responsibilities:
//! - Decode the sync-frame wire format into `SampleBatch`es
//! - Register transport byte sources (real receivers or the mock fleet)
//! - Backpressure management and drop policy
//! - Send to downstream via async-channel
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionPipeline, MockFleet, MockFleetConfig};
//!
//! let mut pipeline = IngestionPipeline::new(100);
//! pipeline.register_source(Box::new(MockFleet::new(MockFleetConfig::default())));
//! pipeline.start_all();
//!
//! let rx = pipeline.take_receiver().unwrap();
//! while let Ok(batch) = rx.recv().await {
//!     // batch: contracts::SampleBatch
//! }
//! ```

mod config;
mod decoder;
mod error;
mod mock;
mod pipeline;
mod source;
mod wire;

// Re-exports
pub use config::{BackpressureConfig, DropPolicy, IngestionMetrics, MetricsSnapshot};
pub use contracts::{RawSample, SampleBatch};
pub use decoder::FrameDecoder;
pub use error::{IngestionError, Result};
pub use mock::{MockFleet, MockFleetConfig, MockSensorSpec};
pub use pipeline::IngestionPipeline;
pub use source::{ByteCallback, TransportSource};
pub use wire::{decode_packet, encode_packet, WireIdMap, SYNC_FRAME_TYPE};

//! Ingestion Pipeline main entry

use std::sync::{Arc, Mutex};

use async_channel::{bounded, Receiver, Sender};
use contracts::SampleBatch;
use tracing::{debug, info, instrument};

use crate::config::{BackpressureConfig, IngestionMetrics};
use crate::decoder::FrameDecoder;
use crate::source::TransportSource;
use crate::wire::WireIdMap;

/// Ingestion Pipeline
///
/// Manages transport sources, feeds their bytes through per-source frame
/// decoders and fans the decoded batches into one downstream channel.
pub struct IngestionPipeline {
    /// Registered sources
    sources: Vec<Box<dyn TransportSource>>,

    /// Shared metrics
    metrics: Arc<IngestionMetrics>,

    /// Batch sender (shared by all sources)
    tx: Sender<SampleBatch>,

    /// Batch receiver
    rx: Option<Receiver<SampleBatch>>,

    /// Wire-address naming applied to every source
    ids: WireIdMap,

    /// Default backpressure configuration
    default_config: BackpressureConfig,
}

impl IngestionPipeline {
    /// Create new Ingestion Pipeline
    ///
    /// # Arguments
    /// * `channel_capacity` - Channel capacity
    pub fn new(channel_capacity: usize) -> Self {
        Self::with_ids(channel_capacity, WireIdMap::default())
    }

    /// Create with a wire-address map from the session blueprint
    pub fn with_ids(channel_capacity: usize, ids: WireIdMap) -> Self {
        let (tx, rx) = bounded(channel_capacity);

        Self {
            sources: Vec::new(),
            metrics: Arc::new(IngestionMetrics::new()),
            tx,
            rx: Some(rx),
            ids,
            default_config: BackpressureConfig {
                channel_capacity,
                ..Default::default()
            },
        }
    }

    /// Register a transport byte source
    #[instrument(
        name = "ingestion_register_source",
        skip(self, source),
        fields(node_id = source.node_id())
    )]
    pub fn register_source(&mut self, source: Box<dyn TransportSource>) {
        debug!(node_id = source.node_id(), "registered transport source");
        self.sources.push(source);
    }

    /// Start all registered sources
    #[instrument(name = "ingestion_start_all", skip(self))]
    pub fn start_all(&self) {
        info!(count = self.sources.len(), "starting all transport sources");
        for source in &self.sources {
            if source.is_listening() {
                continue;
            }

            let decoder = Arc::new(Mutex::new(FrameDecoder::with_metrics(
                source.node_id(),
                self.ids.clone(),
                self.metrics.clone(),
            )));
            let tx = self.tx.clone();
            let metrics = self.metrics.clone();
            let policy = self.default_config.drop_policy;

            source.listen(Arc::new(move |bytes| {
                let batches = decoder.lock().unwrap().feed(&bytes);
                for batch in batches {
                    // Non-blocking either way: the stream must never stall
                    // the transport.
                    let dropped = match policy {
                        crate::config::DropPolicy::DropNewest => tx.try_send(batch).is_err(),
                        crate::config::DropPolicy::DropOldest => {
                            matches!(tx.force_send(batch), Ok(Some(_)))
                        }
                    };
                    if dropped {
                        metrics.record_dropped();
                    }
                }
                metrics.update_queue_len(tx.len());
            }));
        }
    }

    /// Stop all sources
    #[instrument(name = "ingestion_stop_all", skip(self))]
    pub fn stop_all(&self) {
        info!(count = self.sources.len(), "stopping all transport sources");
        for source in &self.sources {
            if source.is_listening() {
                source.stop();
            }
        }
    }

    /// Get batch stream receiver
    ///
    /// Note: Can only be called once, subsequent calls return None
    pub fn take_receiver(&mut self) -> Option<Receiver<SampleBatch>> {
        self.rx.take()
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Get registered source count
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Default backpressure configuration
    pub fn default_config(&self) -> &BackpressureConfig {
        &self.default_config
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockFleet, MockFleetConfig};

    #[test]
    fn test_pipeline_creation() {
        let pipeline = IngestionPipeline::new(100);
        assert_eq!(pipeline.source_count(), 0);
    }

    #[test]
    fn test_take_receiver_once() {
        let mut pipeline = IngestionPipeline::new(100);
        assert!(pipeline.take_receiver().is_some());
        assert!(pipeline.take_receiver().is_none());
    }

    #[test]
    fn test_mock_fleet_flows_through() {
        let mut pipeline = IngestionPipeline::new(100);
        pipeline.register_source(Box::new(MockFleet::new(MockFleetConfig {
            rate_hz: 500.0,
            max_frames: Some(3),
            ..Default::default()
        })));

        let rx = pipeline.take_receiver().unwrap();
        pipeline.start_all();

        let mut seen = 0;
        while seen < 3 {
            match rx.recv_blocking() {
                Ok(batch) => {
                    assert_eq!(batch.samples.len(), 2);
                    seen += 1;
                }
                Err(_) => break,
            }
        }
        assert_eq!(seen, 3);
        pipeline.stop_all();
    }
}

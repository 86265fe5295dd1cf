//! Streaming frame decoder.
//!
//! Accepts arbitrary byte chunks from the transport, carves complete
//! sync-frame packets out of them and resynchronizes on garbage. A rejected
//! packet never kills the stream; the decoder counts it and scans forward.

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tracing::{trace, warn};

use contracts::SampleBatch;

use crate::config::IngestionMetrics;
use crate::wire::{self, WireIdMap, HEADER_LEN, SYNC_FRAME_TYPE};

/// Streaming sync-frame decoder for one transport connection.
#[derive(Debug)]
pub struct FrameDecoder {
    node_id: u16,
    ids: WireIdMap,
    buf: BytesMut,
    metrics: Arc<IngestionMetrics>,
}

impl FrameDecoder {
    pub fn new(node_id: u16, ids: WireIdMap) -> Self {
        Self::with_metrics(node_id, ids, Arc::new(IngestionMetrics::new()))
    }

    pub fn with_metrics(node_id: u16, ids: WireIdMap, metrics: Arc<IngestionMetrics>) -> Self {
        Self {
            node_id,
            ids,
            buf: BytesMut::with_capacity(4096),
            metrics,
        }
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Feed a transport chunk; returns every complete batch it finished.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SampleBatch> {
        self.buf.extend_from_slice(bytes);

        let mut out = Vec::new();
        loop {
            // Scan to the next plausible packet start.
            let skipped = self
                .buf
                .iter()
                .position(|&b| b == SYNC_FRAME_TYPE)
                .unwrap_or(self.buf.len());
            if skipped > 0 {
                self.metrics.record_skipped(skipped as u64);
                warn!(node_id = self.node_id, skipped, "skipped bytes to resync");
                self.buf.advance(skipped);
            }

            if self.buf.len() < HEADER_LEN {
                break;
            }

            let sensor_count = self.buf[9];
            if sensor_count == 0 || sensor_count > wire::MAX_SENSOR_COUNT {
                // Bogus header; never wait for a packet that cannot exist.
                warn!(node_id = self.node_id, sensor_count, "rejected bogus header");
                self.metrics.record_rejected();
                metrics::counter!("mocap_packets_rejected_total").increment(1);
                self.buf.advance(1);
                continue;
            }

            let len = wire::packet_len(sensor_count);
            if self.buf.len() < len {
                // Wait for the remainder of the packet.
                break;
            }

            match wire::decode_packet(&self.buf[..len], self.node_id, &self.ids) {
                Ok(batch) => {
                    trace!(
                        node_id = self.node_id,
                        frame_number = batch.frame_number,
                        sensors = batch.samples.len(),
                        "decoded sync-frame packet"
                    );
                    self.metrics.record_decoded();
                    metrics::counter!("mocap_packets_decoded_total").increment(1);
                    self.buf.advance(len);
                    out.push(batch);
                }
                Err(err) => {
                    // Reject the whole candidate and scan past its type byte.
                    warn!(node_id = self.node_id, error = %err, "rejected packet");
                    self.metrics.record_rejected();
                    metrics::counter!("mocap_packets_rejected_total").increment(1);
                    self.buf.advance(1);
                }
            }
        }

        out
    }

    /// Drop any partial packet still buffered (stream reset).
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

//! SinkHandle - manages a sink with isolated queue and worker task
//!
//! Motion frames are perishable: a renderer fed a stale pose is worse than
//! one fed nothing, and the fusion loop must never block on a slow disk or
//! socket. Each sink therefore gets its own bounded queue and worker; a
//! full queue sheds the incoming frame and counts it.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{DataSink, MotionFrame};

use crate::metrics::SinkMetrics;

/// Frames between explicit flushes. At the nominal 60 Hz fleet rate this
/// bounds recorder loss to about two seconds if the process dies.
const FLUSH_EVERY: u64 = 120;

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send frames to worker
    tx: mpsc::Sender<MotionFrame>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    pub fn spawn<S: DataSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Offer a frame to the sink without waiting.
    ///
    /// Returns true if queued. A full queue sheds the frame: consumers that
    /// fell behind get the next fresh pose instead of a backlog of stale
    /// ones.
    pub fn try_send(&self, frame: MotionFrame) -> bool {
        let frame_number = frame.frame_number;
        match self.tx.try_send(frame) {
            Ok(()) => {
                // Occupied slots = capacity minus remaining permits.
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.inc_dropped_count();
                warn!(
                    sink = %self.name,
                    frame_number,
                    "sink backlog full, shedding motion frame"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Shutdown the sink worker gracefully
    #[instrument(name = "sink_handle_shutdown", skip(self))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        // Wait for worker to finish
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// Worker task that consumes frames and writes to sink.
///
/// Keeps an eye on the frame sequence (gaps mean frames were shed upstream)
/// and flushes the sink periodically so buffered recorders bound their loss
/// window.
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<MotionFrame>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    let mut last_frame: Option<u32> = None;
    let mut since_flush: u64 = 0;

    while let Some(frame) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        if let Some(prev) = last_frame {
            let step = frame.frame_number.wrapping_sub(prev);
            if step > 1 && step < u32::MAX / 2 {
                debug!(
                    sink = %name,
                    missing = step - 1,
                    "gap in dispatched frame sequence"
                );
            }
        }
        last_frame = Some(frame.frame_number);

        match sink.write(&frame).await {
            Ok(()) => {
                metrics.inc_write_count();
                since_flush += 1;
            }
            Err(e) => {
                metrics.inc_failure_count();
                error!(
                    sink = %name,
                    frame_number = frame.frame_number,
                    error = %e,
                    "Write failed"
                );
                // Continue processing - don't crash on single failure
            }
        }

        if since_flush >= FLUSH_EVERY {
            since_flush = 0;
            if let Err(e) = sink.flush().await {
                warn!(sink = %name, error = %e, "Periodic flush failed");
            }
        }
    }

    // Cleanup
    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}

//! LogSink - logs frame summary via tracing

use contracts::{DataSink, MotionFrame, PipelineError};
use tracing::{info, instrument};

/// Sink that logs frame summaries for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_frame_summary(&self, frame: &MotionFrame) {
        let out_of_range = frame
            .joints
            .values()
            .filter(|j| !j.within_physiologic_range)
            .count();

        info!(
            sink = %self.name,
            frame_number = frame.frame_number,
            timestamp_us = frame.timestamp_us,
            segments = frame.segments.len(),
            joints = frame.joints.len(),
            out_of_range,
            incomplete = frame.meta.assembler.incomplete,
            "MotionFrame received"
        );
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, frame),
        fields(sink = %self.name, frame_number = frame.frame_number)
    )]
    async fn write(&mut self, frame: &MotionFrame) -> Result<(), PipelineError> {
        self.log_frame_summary(frame);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), PipelineError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), PipelineError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

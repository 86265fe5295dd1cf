//! JsonlFileSink - records motion frames to disk, one JSON object per line.

use contracts::{DataSink, MotionFrame, PipelineError};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Configuration for JsonlFileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file path (parent directories are created)
    pub path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./recordings/session.jsonl"));

        Self { path }
    }
}

/// First line of every recording.
#[derive(Debug, Serialize)]
struct RecordingHeader<'a> {
    format: &'a str,
    version: u32,
    started_at: String,
}

/// Sink that appends one `MotionFrame` JSON object per line.
pub struct JsonlFileSink {
    name: String,
    writer: BufWriter<File>,
    frames_written: u64,
}

impl JsonlFileSink {
    /// Create a new JsonlFileSink, writing the recording header.
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&config.path)?;
        let mut writer = BufWriter::new(file);

        let header = RecordingHeader {
            format: "mocap-jsonl",
            version: 1,
            started_at: chrono::Utc::now().to_rfc3339(),
        };
        serde_json::to_writer(&mut writer, &header)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writer.write_all(b"\n")?;

        debug!(path = %config.path.display(), "recording started");

        Ok(Self {
            name: name.into(),
            writer,
            frames_written: 0,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl DataSink for JsonlFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, frame),
        fields(sink = %self.name, frame_number = frame.frame_number)
    )]
    async fn write(&mut self, frame: &MotionFrame) -> Result<(), PipelineError> {
        serde_json::to_writer(&mut self.writer, frame).map_err(|e| {
            PipelineError::sink_write(&self.name, format!("serialize failed: {e}"))
        })?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| PipelineError::sink_write(&self.name, e.to_string()))?;
        self.frames_written += 1;
        Ok(())
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), PipelineError> {
        self.writer
            .flush()
            .map_err(|e| PipelineError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), PipelineError> {
        self.writer
            .flush()
            .map_err(|e| PipelineError::sink_write(&self.name, e.to_string()))?;
        debug!(sink = %self.name, frames = self.frames_written, "recording closed");
        Ok(())
    }
}

//! NetworkSink - length-prefixed frame stream to a downstream renderer.
//!
//! One TCP connection per sink; each motion frame is written as a 4-byte
//! little-endian payload length followed by the encoded payload (bincode by
//! default). The length prefix lets the renderer re-frame the byte stream
//! without any delimiter scanning.

use contracts::{DataSink, MotionFrame, PipelineError};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, instrument, warn};

/// Serialization format for the framed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// Bincode (binary, compact) - the renderer feed default
    #[default]
    Bincode,
    /// JSON (human-readable, larger; for debugging consumers)
    Json,
}

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Renderer address
    pub addr: SocketAddr,
    /// Payload format
    pub format: NetworkFormat,
    /// Frames encoding past this size are skipped, not truncated
    pub max_frame_size: usize,
}

impl NetworkSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = match params.get("format").map(String::as_str) {
            Some("json") => NetworkFormat::Json,
            Some("bincode") | None => NetworkFormat::Bincode,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_frame_size = params
            .get("max_frame_size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1 << 20);

        Ok(Self {
            addr,
            format,
            max_frame_size,
        })
    }
}

/// Sink that streams length-prefixed frames over one TCP connection
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    stream: TcpStream,
    frames_sent: u64,
    oversize_count: u64,
}

impl NetworkSink {
    /// Connect to the renderer
    #[instrument(name = "network_sink_new", skip(name, config))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let stream = TcpStream::connect(config.addr).await?;
        // Pose frames are small and latency-sensitive; don't batch them.
        stream.set_nodelay(true)?;

        debug!(
            sink = %name,
            target = %config.addr,
            format = ?config.format,
            "NetworkSink connected"
        );

        Ok(Self {
            name,
            config,
            stream,
            frames_sent: 0,
            oversize_count: 0,
        })
    }

    /// Create from params (for factory)
    #[instrument(name = "network_sink_from_params", skip(name, params))]
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, PipelineError> {
        let name = name.into();
        let config =
            NetworkSinkConfig::from_params(params).map_err(|message| PipelineError::SinkConnection {
                sink_name: name.clone(),
                message,
            })?;
        Self::new(name.clone(), config)
            .await
            .map_err(|e| PipelineError::SinkConnection {
                sink_name: name,
                message: e.to_string(),
            })
    }

    fn encode(&self, frame: &MotionFrame) -> Result<Vec<u8>, PipelineError> {
        match self.config.format {
            NetworkFormat::Bincode => bincode::serialize(frame)
                .map_err(|e| PipelineError::sink_write(&self.name, e.to_string())),
            NetworkFormat::Json => serde_json::to_vec(frame)
                .map_err(|e| PipelineError::sink_write(&self.name, e.to_string())),
        }
    }
}

impl DataSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, frame),
        fields(sink = %self.name, frame_number = frame.frame_number)
    )]
    async fn write(&mut self, frame: &MotionFrame) -> Result<(), PipelineError> {
        let payload = self.encode(frame)?;
        if payload.len() > self.config.max_frame_size {
            self.oversize_count += 1;
            warn!(
                sink = %self.name,
                size = payload.len(),
                max = self.config.max_frame_size,
                "frame exceeds size bound, skipped"
            );
            return Ok(());
        }

        let prefix = (payload.len() as u32).to_le_bytes();
        self.stream
            .write_all(&prefix)
            .await
            .map_err(|e| PipelineError::sink_write(&self.name, e.to_string()))?;
        self.stream
            .write_all(&payload)
            .await
            .map_err(|e| PipelineError::sink_write(&self.name, e.to_string()))?;
        self.frames_sent += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), PipelineError> {
        self.stream
            .flush()
            .await
            .map_err(|e| PipelineError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), PipelineError> {
        let _ = self.stream.shutdown().await;
        debug!(
            sink = %self.name,
            frames = self.frames_sent,
            oversize = self.oversize_count,
            "NetworkSink closed"
        );
        Ok(())
    }
}

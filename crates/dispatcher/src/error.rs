//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Queue full - frame dropped
    #[error("queue full for sink '{sink_name}', frame {frame_number} dropped")]
    QueueFull {
        sink_name: String,
        frame_number: u32,
    },

    /// Sink write error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::PipelineError),
}

impl DispatcherError {
    /// Create sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}

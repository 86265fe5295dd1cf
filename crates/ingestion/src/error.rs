//! Ingestion error definitions.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestionError>;

#[derive(Debug, Error)]
pub enum IngestionError {
    /// Wire packet rejected whole (type byte or size mismatch)
    #[error("packet rejected: {reason}")]
    Rejected { reason: String },

    /// Downstream channel closed while forwarding
    #[error("ingestion channel closed")]
    ChannelClosed,
}

impl IngestionError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

impl From<IngestionError> for contracts::PipelineError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::Rejected { reason } => contracts::PipelineError::PacketRejected { reason },
            IngestionError::ChannelClosed => {
                contracts::PipelineError::Other("ingestion channel closed".to_string())
            }
        }
    }
}

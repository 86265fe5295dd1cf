//! Layered error definitions
//!
//! Categorized by source: config / decode / sync / calibration / sink.
//! The streaming hot path never raises these; it surfaces counters and
//! status flags instead. Errors appear at entry points (config, calibration
//! commits, persistence, sinks).

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum PipelineError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Decode Errors =====
    /// Wire packet rejected (size/type mismatch)
    #[error("packet rejected: {reason}")]
    PacketRejected { reason: String },

    /// Persisted record parse error
    #[error("record parse error for '{what}': {message}")]
    RecordParse { what: String, message: String },

    // ===== Sync Errors =====
    /// Unknown sensor referenced by an operation
    #[error("unknown sensor: {sensor_id}")]
    UnknownSensor { sensor_id: String },

    /// Unknown segment referenced by an operation
    #[error("segment has no mapped sensor: {segment}")]
    UnmappedSegment { segment: String },

    // ===== Calibration Errors =====
    /// Calibration refused to commit
    #[error("calibration invalid for '{subject}': {message}")]
    CalibrationInvalid { subject: String, message: String },

    /// No calibration run is active for the sensor
    #[error("no active calibration run for sensor '{sensor_id}'")]
    NoActiveCalibration { sensor_id: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create packet-reject error
    pub fn packet_rejected(reason: impl Into<String>) -> Self {
        Self::PacketRejected {
            reason: reason.into(),
        }
    }

    /// Create calibration-invalid error
    pub fn calibration_invalid(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CalibrationInvalid {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}

//! Error types for freqwatch

use crate::detector::AccumulationMode;
use thiserror::Error;

/// Errors raised by the detector itself
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectError {
    /// NaN or an infinity reached `observe`; statistics were left untouched
    #[error("Non-finite sample rejected: {0}")]
    NonFiniteSample(f64),

    /// Magnitude too large for the sum of squares to stay finite
    #[error("Sample out of range: {0}")]
    OutOfRange(f64),
}

/// Invalid detector or process configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid threshold coefficient: {0} (must be finite and >= 0)")]
    InvalidThreshold(f64),

    #[error("Invalid window size: {0} (must be >= 1)")]
    InvalidWindow(usize),

    #[error("Invalid half-life: {0} (must be finite and > 0)")]
    InvalidHalfLife(f64),

    #[error("Missing option: {0}")]
    Missing(&'static str),
}

/// A generator session could not be opened
#[derive(Debug, Clone, Error)]
#[error("Invalid session distribution: {0}")]
pub struct GeneratorError(pub String);

/// Stream source errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// Could not reach the stream producer
    #[error("Connection error: {0}")]
    Connect(String),

    /// Producer answered the stream request with a non-success status
    #[error("Stream rejected with status {0}")]
    Status(u16),

    /// Stream broke mid-flight
    #[error("Transport error: {0}")]
    Transport(String),

    /// A line could not be decoded as a frequency message
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Anomaly store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Schema provisioning failed: {0}")]
    Schema(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Checkpoint errors
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Unsupported checkpoint version: {found} (max supported: {max_supported})")]
    UnsupportedVersion { found: u32, max_supported: u32 },

    #[error("Checkpoint holds {found:?} statistics but the detector runs {expected:?}")]
    ModeMismatch {
        expected: AccumulationMode,
        found: AccumulationMode,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that stop stream consumption
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Stream error: {0}")]
    Source(#[from] SourceError),

    #[error("Gave up after {attempts} reconnect attempts: {last}")]
    ReconnectExhausted { attempts: u32, last: SourceError },
}

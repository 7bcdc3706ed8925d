//! Error types for Tally
//!
//! Provides a unified error type and the measurement parse error

use thiserror::Error;

/// Result type alias using TallyError
pub type Result<T> = std::result::Result<T, TallyError>;

/// Unified error type for Tally operations
#[derive(Debug, Error)]
pub enum TallyError {
    // Measurement payload errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    // Scoped store / durable store errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Codec errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Downstream task scheduling errors
    #[error("Scheduling error: {0}")]
    Scheduling(String),

    #[error("Minute index out of range: {0}")]
    InvalidMinute(i64),
}

/// Malformed numeric payload on a recognized status code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid count payload: {payload:?}")]
    InvalidCount { payload: String },

    #[error("invalid value payload: {payload:?}")]
    InvalidValue { payload: String },

    #[error("status {status} expects a paired payload, got {payload:?}")]
    MissingField { status: String, payload: String },
}

// Implement From for common external error types
impl From<serde_json::Error> for TallyError {
    fn from(err: serde_json::Error) -> Self {
        TallyError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for TallyError {
    fn from(err: bincode::Error) -> Self {
        TallyError::Serialization(err.to_string())
    }
}

//! Checkpoint error types.

use thiserror::Error;

/// Errors raised while saving or resuming a service checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckpointError {
    #[error("Failed to encode checkpoint: {0}")]
    SerializationFailed(String),

    #[error("Failed to decode checkpoint: {0}")]
    DeserializationFailed(String),

    /// Written by a different checkpoint format
    #[error("Checkpoint format {found} is not supported (expected {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Checkpoint belongs to chart '{found}', expected '{expected}'")]
    ChartMismatch { expected: String, found: String },

    /// The saved leaves do not form a legal configuration of the chart
    #[error("Checkpoint configuration is invalid: {0}")]
    ValidationFailed(String),
}

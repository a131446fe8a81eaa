//! Boundary error types.

use crontaber_core::ServiceError;
use thiserror::Error;

/// Errors raised while handling an IPC request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No handler is registered for the channel.
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    /// The request body does not match the channel's payload shape.
    #[error("Invalid payload for {channel}: {reason}")]
    InvalidPayload { channel: String, reason: String },

    /// The job id does not exist.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Failure inside the jobs service.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A response could not be encoded.
    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

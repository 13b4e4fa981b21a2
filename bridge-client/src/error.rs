//! Client error types

use shared::channel::CodecError;
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection failed or was lost
    #[error("Connection error: {0}")]
    Connection(String),

    /// No reply arrived in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Wire codec failure
    #[error("Channel error: {0}")]
    Channel(#[from] CodecError),

    /// Reply did not carry the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The bridge reported a channel-level error
    #[error("Bridge error {code}: {message}")]
    Bridge { code: String, message: String },

    /// The bridge does not know this method
    #[error("Method not implemented: {0}")]
    NotImplemented(String),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

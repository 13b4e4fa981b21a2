//! Server-side error types
//!
//! Printer failures never surface here: the dispatch layer collapses them
//! into boolean method results. [`BridgeError`] covers the channel plumbing
//! itself (sockets, framing, broadcast wiring).

use shared::channel::CodecError;
use thiserror::Error;

/// Bridge error type
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Wire codec failure
    #[error("Channel error: {0}")]
    Channel(#[from] CodecError),

    /// Socket-level failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed request
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// ========== Convenient constructors ==========

impl BridgeError {
    /// Create an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an Invalid error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

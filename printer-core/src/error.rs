//! Error types for the printer transports

use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// Network connection error
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error during printing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Printer is offline or unreachable
    #[error("Printer offline: {0}")]
    Offline(String),

    /// Timeout waiting for printer
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Malformed printer address or device identifier
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Transport not available on this platform
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Spooler-specific printing error
    #[cfg(windows)]
    #[error("Spooler error: {0}")]
    Spooler(String),
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;

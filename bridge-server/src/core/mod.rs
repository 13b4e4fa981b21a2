//! Core types: configuration, errors, session state

pub mod config;
pub mod error;
pub mod session;

pub use config::Config;
pub use error::{BridgeError, BridgeResult};
pub use session::PrinterSession;

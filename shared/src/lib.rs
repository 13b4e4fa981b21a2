//! Shared types for the thermal printer bridge.
//!
//! Everything that crosses the channel lives here: the message envelope and
//! framing codec (`channel`) and the records those messages carry (`model`).
//! `bridge-server` and `bridge-client` both depend on this crate, which keeps
//! the two sides of the boundary in agreement.

pub mod channel;
pub mod model;

// Channel re-exports (for convenient access)
pub use channel::{ChannelMessage, EventType, PROTOCOL_VERSION};

// Model re-exports
pub use model::{BluetoothDevice, ConnectionState, PrinterDescriptor};

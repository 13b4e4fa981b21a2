//! Printer Bridge Client
//!
//! Client for the printer bridge method channel. Supports TCP connections
//! to a bridge process and in-process wiring for tests.
//!
//! # Example
//!
//! ```ignore
//! use bridge_client::BridgeClient;
//!
//! let client = BridgeClient::connect("127.0.0.1:9110", "my-app").await?;
//! for printer in client.get_list().await? {
//!     println!("{} ({})", printer.name, printer.model);
//! }
//! client.connect_printer("EPSON TM-T20II").await?;
//! client.print_bytes(&[0x1b, 0x40]).await?;
//! client.close_printer().await?;
//! ```

mod client;
pub mod error;

pub use client::BridgeClient;
pub use error::{ClientError, ClientResult};

// Re-export the channel vocabulary clients work with
pub use shared::channel::{ChannelMessage, EventType, MethodResultPayload, StateEventPayload};
pub use shared::model::{BluetoothDevice, ConnectionState, PrinterDescriptor};

//! # printer-core
//!
//! Thermal printer transports - low-level device access only.
//!
//! ## Scope
//!
//! This crate handles HOW bytes reach a printer:
//! - OS spooler printing with the RAW datatype (Windows)
//! - Network printing (TCP port 9100)
//! - Bluetooth SPP printing over bound RFCOMM devices (Linux)
//!
//! What the bytes mean (ESC/POS rendering, receipt layout) stays in the
//! caller; payloads pass through unmodified.
//!
//! ## Example
//!
//! ```ignore
//! use printer_core::{NetworkPrinter, Printer};
//!
//! let printer = NetworkPrinter::new("192.168.1.100", 9100)?;
//! printer.print(&ticket_bytes).await?;
//! ```

pub mod bluetooth;
mod error;
mod network;
mod spooler;

// Re-exports
pub use bluetooth::RfcommPrinter;
pub use error::{PrintError, PrintResult};
pub use network::NetworkPrinter;
pub use spooler::SpoolerPrinter;

/// Printer trait - common interface for all printer backends
///
/// Uses async fn in traits (Rust 1.75+). For simplicity we accept the
/// `async_fn_in_trait` lint since this is an internal library.
#[allow(async_fn_in_trait)]
pub trait Printer {
    /// Send raw printer data to the device
    async fn print(&self, data: &[u8]) -> PrintResult<()>;

    /// Check if the printer is online/reachable
    async fn is_online(&self) -> bool;
}

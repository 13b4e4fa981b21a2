//! Data model for the printer bridge.
//!
//! These records mirror what the platform stacks report; none of them has an
//! independent lifecycle. Descriptors are created per list call and thrown
//! away, the link state is a single slot owned by the server session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Printer descriptor as reported by the platform printing stack.
///
/// Wire keys match the method-channel contract: `name`, `model`, `default`,
/// `available`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterDescriptor {
    /// Spooler name; also the key `connectPrinter` resolves
    pub name: String,
    /// Driver/model string
    pub model: String,
    /// Whether the OS reports this printer as the default
    #[serde(rename = "default")]
    pub is_default: bool,
    /// Whether the printer looked reachable when listed
    pub available: bool,
}

impl PrinterDescriptor {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            is_default: false,
            available: false,
        }
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }
}

/// Paired Bluetooth device record: `{ name, address }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothDevice {
    pub name: String,
    /// MAC address, colon-separated
    pub address: String,
}

impl BluetoothDevice {
    /// When the platform reports no name, the address stands in for it.
    pub fn new(name: Option<String>, address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            name: name.unwrap_or_else(|| address.clone()),
            address,
        }
    }
}

/// Bluetooth link state.
///
/// The wire codes of the state event stream collapse `Failed` into `None`:
/// clients only ever see 0 (idle), 1 (connecting), 2 (connected).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    None,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    /// Numeric code broadcast on the state event stream.
    pub fn event_code(self) -> u8 {
        match self {
            ConnectionState::None | ConnectionState::Failed => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
        }
    }

    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::None => write!(f, "none"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_wire_keys() {
        let descriptor = PrinterDescriptor::new("EPSON TM-T20II", "EPSON TM-T20II Receipt5")
            .with_default(true)
            .with_available(true);

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["name"], "EPSON TM-T20II");
        assert_eq!(json["model"], "EPSON TM-T20II Receipt5");
        assert_eq!(json["default"], true);
        assert_eq!(json["available"], true);
    }

    #[test]
    fn test_bluetooth_device_name_fallback() {
        let named = BluetoothDevice::new(Some("RPP02N".to_string()), "86:67:7A:27:01:D5");
        assert_eq!(named.name, "RPP02N");

        let unnamed = BluetoothDevice::new(None, "86:67:7A:27:01:D5");
        assert_eq!(unnamed.name, "86:67:7A:27:01:D5");
        assert_eq!(unnamed.address, "86:67:7A:27:01:D5");
    }

    #[test]
    fn test_failed_collapses_to_idle_code() {
        assert_eq!(ConnectionState::Failed.event_code(), 0);
        assert_eq!(ConnectionState::None.event_code(), 0);
        assert!(!ConnectionState::Failed.is_connected());
        assert!(ConnectionState::Connected.is_connected());
    }
}

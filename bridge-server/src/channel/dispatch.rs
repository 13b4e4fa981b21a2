//! Method dispatch
//!
//! Maps method names to session operations. Names and argument keys are
//! spelled exactly as callers send them over the channel; anything not in
//! the table answers `not_implemented`.
//!
//! Failures inside an operation never escape as channel errors. A method
//! that could not do its work answers `false`, with the cause logged
//! server-side.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value;
use std::sync::Arc;

use printer_core::{SpoolerPrinter, bluetooth};
use shared::channel::MethodCallPayload;
use shared::channel::MethodResultPayload;

use crate::core::PrinterSession;

/// Method-name dispatcher bound to one session
pub struct Dispatcher {
    session: Arc<PrinterSession>,
}

impl Dispatcher {
    pub fn new(session: Arc<PrinterSession>) -> Self {
        Self { session }
    }

    /// Dispatch one method call and produce its result
    pub async fn dispatch(&self, call: &MethodCallPayload) -> MethodResultPayload {
        tracing::debug!(method = %call.method, "Dispatching method call");

        match call.method.as_str() {
            "getList" => self.get_list().await,
            "connectPrinter" => self.connect_printer(call).await,
            "close" => MethodResultPayload::flag(self.session.close().await),
            "printBytes" => self.print_bytes(call).await,
            "printText" => self.print_text(call).await,
            "printRawData" => self.print_raw_data(call).await,
            "getBluetoothList" => self.bluetooth_list().await,
            "getBluetoothLeList" => self.bluetooth_le_list(),
            "onStartConnection" => self.start_connection(call).await,
            "disconnect" => MethodResultPayload::flag(self.session.disconnect().await),
            "sendDataByte" => self.send_data_byte(call).await,
            "sendText" => self.send_text(call).await,
            other => {
                tracing::warn!(method = %other, "Method not implemented");
                MethodResultPayload::not_implemented(other)
            }
        }
    }

    /// `getList`: enumerate spooler printers
    ///
    /// Enumeration failure degrades to an empty list.
    async fn get_list(&self) -> MethodResultPayload {
        let printers = match tokio::task::spawn_blocking(SpoolerPrinter::list).await {
            Ok(Ok(printers)) => printers,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to enumerate printers");
                Vec::new()
            }
            Err(e) => {
                tracing::error!(error = %e, "Printer enumeration task failed");
                Vec::new()
            }
        };

        descriptor_list(&printers)
    }

    /// `connectPrinter {name}`: open a print link
    ///
    /// An omitted or empty name falls back to the platform default printer.
    async fn connect_printer(&self, call: &MethodCallPayload) -> MethodResultPayload {
        let name = arg_str(call, "name").unwrap_or_default();
        MethodResultPayload::flag(self.session.connect_printer(name).await)
    }

    /// `printBytes {bytes}`: send a byte list to the print link
    async fn print_bytes(&self, call: &MethodCallPayload) -> MethodResultPayload {
        match arg_bytes(call, "bytes") {
            Some(bytes) => MethodResultPayload::flag(self.session.print_job(&bytes).await),
            None => {
                tracing::warn!("printBytes called without a byte list");
                MethodResultPayload::flag(false)
            }
        }
    }

    /// `printText {text}`: send UTF-8 text to the print link
    async fn print_text(&self, call: &MethodCallPayload) -> MethodResultPayload {
        match arg_str(call, "text") {
            Some(text) => MethodResultPayload::flag(self.session.print_job(text.as_bytes()).await),
            None => {
                tracing::warn!("printText called without text");
                MethodResultPayload::flag(false)
            }
        }
    }

    /// `printRawData {raw}`: send base64-encoded bytes to the print link
    async fn print_raw_data(&self, call: &MethodCallPayload) -> MethodResultPayload {
        let Some(raw) = arg_str(call, "raw") else {
            tracing::warn!("printRawData called without data");
            return MethodResultPayload::flag(false);
        };

        match STANDARD.decode(raw) {
            Ok(bytes) => MethodResultPayload::flag(self.session.print_job(&bytes).await),
            Err(e) => {
                tracing::warn!(error = %e, "printRawData payload is not valid base64");
                MethodResultPayload::flag(false)
            }
        }
    }

    /// `getBluetoothList`: enumerate paired bluetooth devices
    ///
    /// Enumeration failure degrades to an empty list.
    async fn bluetooth_list(&self) -> MethodResultPayload {
        let devices = match tokio::task::spawn_blocking(bluetooth::paired_devices).await {
            Ok(Ok(devices)) => devices,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to enumerate bluetooth devices");
                Vec::new()
            }
            Err(e) => {
                tracing::error!(error = %e, "Bluetooth enumeration task failed");
                Vec::new()
            }
        };

        descriptor_list(&devices)
    }

    /// `getBluetoothLeList`: BLE scanning is not offered over RFCOMM
    fn bluetooth_le_list(&self) -> MethodResultPayload {
        tracing::debug!("BLE scan requested, answering with empty list");
        MethodResultPayload::ok(Value::Array(Vec::new()))
    }

    /// `onStartConnection {address, isBle, autoConnect}`: open a bluetooth link
    async fn start_connection(&self, call: &MethodCallPayload) -> MethodResultPayload {
        let Some(address) = arg_str(call, "address") else {
            tracing::warn!("onStartConnection called without an address");
            return MethodResultPayload::flag(false);
        };

        let is_ble = arg_bool(call, "isBle").unwrap_or(false);
        let auto_connect = arg_bool(call, "autoConnect").unwrap_or(false);

        if is_ble {
            tracing::warn!(address = %address, "BLE connections are not supported");
            return MethodResultPayload::flag(false);
        }

        MethodResultPayload::flag(self.session.connect_bluetooth(address, auto_connect).await)
    }

    /// `sendDataByte {bytes}`: send a byte list to the bluetooth link
    async fn send_data_byte(&self, call: &MethodCallPayload) -> MethodResultPayload {
        match arg_bytes(call, "bytes") {
            Some(bytes) => MethodResultPayload::flag(self.session.send_bluetooth(&bytes).await),
            None => {
                tracing::warn!("sendDataByte called without a byte list");
                MethodResultPayload::flag(false)
            }
        }
    }

    /// `sendText {text}`: send UTF-8 text to the bluetooth link
    async fn send_text(&self, call: &MethodCallPayload) -> MethodResultPayload {
        match arg_str(call, "text") {
            Some(text) => {
                MethodResultPayload::flag(self.session.send_bluetooth(text.as_bytes()).await)
            }
            None => {
                tracing::warn!("sendText called without text");
                MethodResultPayload::flag(false)
            }
        }
    }
}

// ========== Argument extraction ==========

fn arg_str<'a>(call: &'a MethodCallPayload, key: &str) -> Option<&'a str> {
    call.arguments.get(key).and_then(Value::as_str)
}

fn arg_bool(call: &MethodCallPayload, key: &str) -> Option<bool> {
    call.arguments.get(key).and_then(Value::as_bool)
}

/// Extract a byte list argument
///
/// Callers send byte lists as JSON integer arrays. Values are truncated
/// to their low byte, so -1 and 255 both mean 0xff.
fn arg_bytes(call: &MethodCallPayload, key: &str) -> Option<Vec<u8>> {
    let values = call.arguments.get(key)?.as_array()?;
    let mut bytes = Vec::with_capacity(values.len());
    for value in values {
        bytes.push((value.as_i64()? & 0xff) as u8);
    }
    Some(bytes)
}

/// Serialize a descriptor list into a result value
fn descriptor_list<T: serde::Serialize>(items: &[T]) -> MethodResultPayload {
    match serde_json::to_value(items) {
        Ok(value) => MethodResultPayload::ok(value),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize descriptor list");
            MethodResultPayload::ok(Value::Array(Vec::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::broadcast;

    fn dispatcher() -> Dispatcher {
        let (tx, _) = broadcast::channel(16);
        Dispatcher::new(Arc::new(PrinterSession::new(tx)))
    }

    fn call(method: &str, args: Value) -> MethodCallPayload {
        let arguments = match args {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        MethodCallPayload::with_arguments(method, arguments)
    }

    #[tokio::test]
    async fn test_unknown_method_is_not_implemented() {
        let result = dispatcher()
            .dispatch(&MethodCallPayload::new("frobnicate"))
            .await;
        assert!(result.is_not_implemented());
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_connect_without_name_needs_a_default_printer() {
        // No spooler, so no default printer to fall back to
        let result = dispatcher()
            .dispatch(&MethodCallPayload::new("connectPrinter"))
            .await;
        assert_eq!(result.as_flag(), Some(false));
    }

    #[tokio::test]
    async fn test_print_without_connection_is_false() {
        let d = dispatcher();

        let result = d
            .dispatch(&call("printBytes", json!({ "bytes": [27, 64] })))
            .await;
        assert_eq!(result.as_flag(), Some(false));

        let result = d
            .dispatch(&call("printText", json!({ "text": "hello" })))
            .await;
        assert_eq!(result.as_flag(), Some(false));
    }

    #[tokio::test]
    async fn test_close_and_disconnect_always_succeed() {
        let d = dispatcher();
        assert_eq!(
            d.dispatch(&MethodCallPayload::new("close")).await.as_flag(),
            Some(true)
        );
        assert_eq!(
            d.dispatch(&MethodCallPayload::new("disconnect"))
                .await
                .as_flag(),
            Some(true)
        );
    }

    #[tokio::test]
    async fn test_ble_connection_is_refused() {
        let result = dispatcher()
            .dispatch(&call(
                "onStartConnection",
                json!({ "address": "AA:BB:CC:DD:EE:FF", "isBle": true }),
            ))
            .await;
        assert_eq!(result.as_flag(), Some(false));
    }

    #[tokio::test]
    async fn test_ble_list_is_empty() {
        let result = dispatcher()
            .dispatch(&MethodCallPayload::new("getBluetoothLeList"))
            .await;
        match result {
            MethodResultPayload::Success { value } => {
                assert_eq!(value, json!([]));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_raw_data_rejects_bad_base64() {
        let result = dispatcher()
            .dispatch(&call("printRawData", json!({ "raw": "@@not-base64@@" })))
            .await;
        assert_eq!(result.as_flag(), Some(false));
    }

    #[test]
    fn test_byte_coercion_truncates_to_low_byte() {
        let payload = call("printBytes", json!({ "bytes": [0, 255, 256, -1, 300] }));
        let bytes = arg_bytes(&payload, "bytes").unwrap();
        assert_eq!(bytes, vec![0, 255, 0, 255, 44]);
    }

    #[test]
    fn test_byte_list_with_non_integers_is_rejected() {
        let payload = call("printBytes", json!({ "bytes": [27, "x", 64] }));
        assert!(arg_bytes(&payload, "bytes").is_none());
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_get_list_degrades_to_empty() {
        let result = dispatcher()
            .dispatch(&MethodCallPayload::new("getList"))
            .await;
        match result {
            MethodResultPayload::Success { value } => {
                assert_eq!(value, json!([]));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }
}

use crate::error::{ClientError, ClientResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::channel::{
    ChannelMessage, HandshakePayload, MemoryTransport, MethodCallPayload, MethodResultPayload,
    PROTOCOL_VERSION, TcpTransport,
};
use shared::model::{BluetoothDevice, PrinterDescriptor};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Bridge client
///
/// Speaks the method channel: named calls with argument maps, correlated
/// results, and a broadcast stream of connection-state events.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    transport: ClientTransport,
    event_tx: broadcast::Sender<ChannelMessage>,
    pending_requests: Arc<Mutex<HashMap<Uuid, oneshot::Sender<ChannelMessage>>>>,
}

#[derive(Debug, Clone)]
enum ClientTransport {
    Tcp(TcpTransport),
    Memory(MemoryTransport),
}

impl ClientTransport {
    async fn read_message(&self) -> ClientResult<ChannelMessage> {
        match self {
            ClientTransport::Tcp(t) => Ok(t.read_message().await?),
            ClientTransport::Memory(t) => Ok(t.read_message().await?),
        }
    }

    async fn write_message(&self, msg: &ChannelMessage) -> ClientResult<()> {
        match self {
            ClientTransport::Tcp(t) => Ok(t.write_message(msg).await?),
            ClientTransport::Memory(t) => Ok(t.write_message(msg).await?),
        }
    }

    async fn close(&self) -> ClientResult<()> {
        match self {
            ClientTransport::Tcp(t) => Ok(t.close().await?),
            ClientTransport::Memory(t) => Ok(t.close().await?),
        }
    }
}

impl BridgeClient {
    /// Connect to a bridge over TCP
    pub async fn connect(addr: &str, client_name: &str) -> ClientResult<Self> {
        let transport = TcpTransport::connect(addr)
            .await
            .map_err(|e| ClientError::Connection(format!("Failed to connect to {}: {}", addr, e)))?;
        let client_transport = ClientTransport::Tcp(transport);

        // Introduce ourselves; the server does not acknowledge handshakes
        let payload = HandshakePayload {
            version: PROTOCOL_VERSION,
            client_name: Some(client_name.to_string()),
            client_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        };
        client_transport
            .write_message(&ChannelMessage::handshake(&payload))
            .await?;

        Ok(Self::new(client_transport))
    }

    /// Create an in-process client
    ///
    /// Wires directly into a server's broadcast channels; no handshake is
    /// needed inside the same process.
    pub fn memory(
        server_broadcast_tx: &broadcast::Sender<ChannelMessage>,
        client_to_server_tx: &broadcast::Sender<ChannelMessage>,
    ) -> Self {
        let transport =
            MemoryTransport::with_client_sender(server_broadcast_tx, client_to_server_tx);
        Self::new(ClientTransport::Memory(transport))
    }

    fn new(transport: ClientTransport) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        let pending_requests: Arc<Mutex<HashMap<Uuid, oneshot::Sender<ChannelMessage>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let client = Self {
            transport: transport.clone(),
            event_tx: event_tx.clone(),
            pending_requests: pending_requests.clone(),
        };

        // Background task: resolve replies, forward everything to the event bus
        let pending_requests_clone = pending_requests.clone();
        tokio::spawn(async move {
            loop {
                match transport.read_message().await {
                    Ok(msg) => {
                        if let Some(correlation_id) = msg.correlation_id {
                            let mut pending = pending_requests_clone
                                .lock()
                                .unwrap_or_else(|poisoned| poisoned.into_inner());
                            if let Some(tx) = pending.remove(&correlation_id) {
                                let _ = tx.send(msg.clone());
                            }
                        }

                        if let Err(e) = event_tx.send(msg) {
                            tracing::debug!("No subscribers for event: {}", e);
                        }
                    }
                    Err(e) => {
                        tracing::error!("Transport read error: {}", e);
                        break;
                    }
                }
            }
        });

        client
    }

    /// Subscribe to the event stream (state events, all replies)
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelMessage> {
        self.event_tx.subscribe()
    }

    /// Receive the next broadcast event
    pub async fn recv(&self) -> ClientResult<ChannelMessage> {
        let mut rx = self.event_tx.subscribe();
        rx.recv()
            .await
            .map_err(|e| ClientError::Connection(format!("Event bus error: {}", e)))
    }

    /// Send a message (fire and forget)
    pub async fn send(&self, msg: &ChannelMessage) -> ClientResult<()> {
        self.transport.write_message(msg).await
    }

    /// Send a message and await the correlated reply
    pub async fn request(&self, msg: &ChannelMessage) -> ClientResult<ChannelMessage> {
        let request_id = msg.request_id;
        let (tx, rx) = oneshot::channel();

        // Register before sending so a fast reply cannot slip past
        {
            let mut pending = self
                .pending_requests
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            pending.insert(request_id, tx);
        }

        if let Err(e) = self.send(msg).await {
            let mut pending = self
                .pending_requests
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            pending.remove(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(std::time::Duration::from_secs(10), rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ClientError::Connection(
                "Response channel closed".to_string(),
            )),
            Err(_) => {
                let mut pending = self
                    .pending_requests
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                pending.remove(&request_id);
                Err(ClientError::Timeout(format!(
                    "No reply for request {}",
                    request_id
                )))
            }
        }
    }

    /// Invoke a method by name
    ///
    /// The low-level entry point behind the typed wrappers; useful for
    /// methods this client does not know about.
    pub async fn call(
        &self,
        method: &str,
        arguments: Option<serde_json::Map<String, Value>>,
    ) -> ClientResult<MethodResultPayload> {
        let payload = match arguments {
            Some(arguments) => MethodCallPayload::with_arguments(method, arguments),
            None => MethodCallPayload::new(method),
        };

        let reply = self.request(&ChannelMessage::method_call(&payload)).await?;
        Ok(reply.parse_payload()?)
    }

    async fn call_flag(
        &self,
        method: &str,
        arguments: Option<serde_json::Map<String, Value>>,
    ) -> ClientResult<bool> {
        flag_result(self.call(method, arguments).await?)
    }

    // ========== Typed methods ==========

    /// `getList`: printers known to the OS spooler
    pub async fn get_list(&self) -> ClientResult<Vec<PrinterDescriptor>> {
        value_result(self.call("getList", None).await?)
    }

    /// `connectPrinter`: open a print link to a queue name or host:port
    pub async fn connect_printer(&self, name: &str) -> ClientResult<bool> {
        let mut args = serde_json::Map::new();
        args.insert("name".into(), Value::String(name.to_string()));
        self.call_flag("connectPrinter", Some(args)).await
    }

    /// `close`: drop the print link
    pub async fn close_printer(&self) -> ClientResult<bool> {
        self.call_flag("close", None).await
    }

    /// `printBytes`: send bytes to the print link
    pub async fn print_bytes(&self, bytes: &[u8]) -> ClientResult<bool> {
        let mut args = serde_json::Map::new();
        args.insert("bytes".into(), byte_list(bytes));
        self.call_flag("printBytes", Some(args)).await
    }

    /// `printText`: send UTF-8 text to the print link
    pub async fn print_text(&self, text: &str) -> ClientResult<bool> {
        let mut args = serde_json::Map::new();
        args.insert("text".into(), Value::String(text.to_string()));
        self.call_flag("printText", Some(args)).await
    }

    /// `printRawData`: send base64-encoded bytes to the print link
    pub async fn print_raw_data(&self, raw: &str) -> ClientResult<bool> {
        let mut args = serde_json::Map::new();
        args.insert("raw".into(), Value::String(raw.to_string()));
        self.call_flag("printRawData", Some(args)).await
    }

    /// `getBluetoothList`: paired bluetooth devices
    pub async fn bluetooth_list(&self) -> ClientResult<Vec<BluetoothDevice>> {
        value_result(self.call("getBluetoothList", None).await?)
    }

    /// `getBluetoothLeList`: BLE devices (always empty on this bridge)
    pub async fn bluetooth_le_list(&self) -> ClientResult<Vec<BluetoothDevice>> {
        value_result(self.call("getBluetoothLeList", None).await?)
    }

    /// `onStartConnection`: open a bluetooth link by MAC address
    pub async fn start_connection(&self, address: &str, auto_connect: bool) -> ClientResult<bool> {
        let mut args = serde_json::Map::new();
        args.insert("address".into(), Value::String(address.to_string()));
        args.insert("isBle".into(), Value::Bool(false));
        args.insert("autoConnect".into(), Value::Bool(auto_connect));
        self.call_flag("onStartConnection", Some(args)).await
    }

    /// `disconnect`: drop the bluetooth link
    pub async fn disconnect(&self) -> ClientResult<bool> {
        self.call_flag("disconnect", None).await
    }

    /// `sendDataByte`: send bytes to the bluetooth link
    pub async fn send_data_byte(&self, bytes: &[u8]) -> ClientResult<bool> {
        let mut args = serde_json::Map::new();
        args.insert("bytes".into(), byte_list(bytes));
        self.call_flag("sendDataByte", Some(args)).await
    }

    /// `sendText`: send UTF-8 text to the bluetooth link
    pub async fn send_text(&self, text: &str) -> ClientResult<bool> {
        let mut args = serde_json::Map::new();
        args.insert("text".into(), Value::String(text.to_string()));
        self.call_flag("sendText", Some(args)).await
    }

    /// Close the client connection
    pub async fn close(&self) -> ClientResult<()> {
        self.transport.close().await
    }
}

fn byte_list(bytes: &[u8]) -> Value {
    Value::Array(bytes.iter().map(|b| Value::from(*b)).collect())
}

fn flag_result(result: MethodResultPayload) -> ClientResult<bool> {
    match result {
        MethodResultPayload::Success {
            value: Value::Bool(flag),
        } => Ok(flag),
        MethodResultPayload::Success { value } => Err(ClientError::InvalidResponse(format!(
            "expected a boolean, got {}",
            value
        ))),
        MethodResultPayload::Error { code, message, .. } => {
            Err(ClientError::Bridge { code, message })
        }
        MethodResultPayload::NotImplemented { method } => Err(ClientError::NotImplemented(method)),
    }
}

fn value_result<T: DeserializeOwned>(result: MethodResultPayload) -> ClientResult<T> {
    match result {
        MethodResultPayload::Success { value } => Ok(serde_json::from_value(value)?),
        MethodResultPayload::Error { code, message, .. } => {
            Err(ClientError::Bridge { code, message })
        }
        MethodResultPayload::NotImplemented { method } => Err(ClientError::NotImplemented(method)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::channel::{EventType, StateEventPayload};

    /// Answer every method call with a `true` flag
    fn spawn_echo_server(
        server_tx: broadcast::Sender<ChannelMessage>,
        mut client_rx: broadcast::Receiver<ChannelMessage>,
    ) {
        tokio::spawn(async move {
            while let Ok(msg) = client_rx.recv().await {
                if msg.event_type == EventType::MethodCall {
                    let reply = ChannelMessage::method_result(
                        &MethodResultPayload::flag(true),
                        msg.request_id,
                    );
                    let _ = server_tx.send(reply);
                }
            }
        });
    }

    #[tokio::test]
    async fn test_request_resolves_by_correlation() {
        let (server_tx, _) = broadcast::channel(16);
        let (client_tx, client_rx) = broadcast::channel(16);
        spawn_echo_server(server_tx.clone(), client_rx);

        let client = BridgeClient::memory(&server_tx, &client_tx);
        assert!(client.close_printer().await.unwrap());
    }

    #[tokio::test]
    async fn test_state_events_reach_subscribers() {
        let (server_tx, _) = broadcast::channel(16);
        let (client_tx, _) = broadcast::channel(16);

        let client = BridgeClient::memory(&server_tx, &client_tx);
        let mut events = client.subscribe();

        server_tx
            .send(ChannelMessage::state_event(&StateEventPayload { state: 2 }))
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::StateEvent);
        assert_eq!(
            event.parse_payload::<StateEventPayload>().unwrap().state,
            2
        );
    }

    #[test]
    fn test_flag_result_shapes() {
        assert!(flag_result(MethodResultPayload::flag(true)).unwrap());
        assert!(!flag_result(MethodResultPayload::flag(false)).unwrap());

        assert!(matches!(
            flag_result(MethodResultPayload::ok(Value::Null)),
            Err(ClientError::InvalidResponse(_))
        ));
        assert!(matches!(
            flag_result(MethodResultPayload::error("oops", "broken")),
            Err(ClientError::Bridge { .. })
        ));
        assert!(matches!(
            flag_result(MethodResultPayload::not_implemented("nope")),
            Err(ClientError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_value_result_parses_descriptors() {
        let value = serde_json::json!([
            { "name": "EPSON", "model": "TM-T20II", "default": true, "available": true }
        ]);
        let printers: Vec<PrinterDescriptor> =
            value_result(MethodResultPayload::ok(value)).unwrap();
        assert_eq!(printers.len(), 1);
        assert_eq!(printers[0].name, "EPSON");
        assert!(printers[0].is_default);
    }

    #[test]
    fn test_byte_list_is_plain_integers() {
        let value = byte_list(&[0, 27, 255]);
        assert_eq!(value, serde_json::json!([0, 27, 255]));
    }
}

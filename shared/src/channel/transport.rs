//! Pluggable transports for channel messages
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           ChannelServer                 │
//! │  ┌───────────────────────────────────┐  │
//! │  │  broadcast::Sender<ChannelMessage>│  │
//! │  └───────────────────────────────────┘  │
//! └────────────────┬────────────────────────┘
//!                  │
//!         ┌────────┴────────┐
//!         │ Transport Trait │
//!         └────────┬────────┘
//!                  │
//!         ┌────────┴────────┐
//!         ▼                 ▼
//!    TcpTransport     MemoryTransport
//!    (localhost)      (same process)
//! ```
//!
//! Both sides of the channel use these: the server wraps accepted sockets,
//! clients wrap outgoing connections or a pair of in-process channels.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::sync::broadcast;

use crate::channel::codec::{self, CodecError};
use crate::channel::ChannelMessage;

// ========== Transport Trait ==========

#[async_trait]
pub trait Transport: Send + Sync {
    async fn read_message(&self) -> Result<ChannelMessage, CodecError>;
    async fn write_message(&self, msg: &ChannelMessage) -> Result<(), CodecError>;
}

// ========== TCP Transport ==========

/// TCP transport implementation
#[derive(Debug, Clone)]
pub struct TcpTransport {
    reader: Arc<Mutex<OwnedReadHalf>>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl TcpTransport {
    pub async fn connect(addr: &str) -> Result<Self, CodecError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: Arc::new(Mutex::new(reader)),
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    pub async fn read_message(&self) -> Result<ChannelMessage, CodecError> {
        let mut reader = self.reader.lock().await;
        codec::read_message(&mut *reader).await
    }

    pub async fn write_message(&self, msg: &ChannelMessage) -> Result<(), CodecError> {
        let mut writer = self.writer.lock().await;
        codec::write_message(&mut *writer, msg).await
    }

    /// Shut down the write half; the peer sees EOF on its next read.
    pub async fn close(&self) -> Result<(), CodecError> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn read_message(&self) -> Result<ChannelMessage, CodecError> {
        self.read_message().await
    }

    async fn write_message(&self, msg: &ChannelMessage) -> Result<(), CodecError> {
        self.write_message(msg).await
    }
}

// ========== Memory Transport (In-Process) ==========

/// In-process transport for same-process callers
///
/// Uses tokio broadcast channels internally; no serialization happens until
/// a message actually crosses a socket, so this path is copy-only.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    rx: Arc<Mutex<broadcast::Receiver<ChannelMessage>>>,
    tx: Option<Arc<broadcast::Sender<ChannelMessage>>>,
}

impl MemoryTransport {
    /// Create from a server broadcast sender (receive-only)
    pub fn new(tx: &broadcast::Sender<ChannelMessage>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(tx.subscribe())),
            tx: None,
        }
    }

    /// Create a duplex transport that can also send toward the server
    pub fn with_client_sender(
        broadcast_tx: &broadcast::Sender<ChannelMessage>,
        client_tx: &broadcast::Sender<ChannelMessage>,
    ) -> Self {
        Self {
            rx: Arc::new(Mutex::new(broadcast_tx.subscribe())),
            tx: Some(Arc::new(client_tx.clone())),
        }
    }

    pub async fn read_message(&self) -> Result<ChannelMessage, CodecError> {
        let mut rx = self.rx.lock().await;
        rx.recv()
            .await
            .map_err(|e| CodecError::Channel(e.to_string()))
    }

    pub async fn write_message(&self, msg: &ChannelMessage) -> Result<(), CodecError> {
        if let Some(tx) = &self.tx {
            tx.send(msg.clone())
                .map_err(|e| CodecError::Channel(e.to_string()))?;
        }
        Ok(())
    }

    pub async fn close(&self) -> Result<(), CodecError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read_message(&self) -> Result<ChannelMessage, CodecError> {
        self.read_message().await
    }

    async fn write_message(&self, msg: &ChannelMessage) -> Result<(), CodecError> {
        self.write_message(msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{EventType, MethodCallPayload, StateEventPayload};

    #[tokio::test]
    async fn test_memory_transport_duplex() {
        let (server_tx, _) = broadcast::channel(16);
        let (client_tx, mut client_rx) = broadcast::channel(16);

        let transport = MemoryTransport::with_client_sender(&server_tx, &client_tx);

        // Calls written by the client land on the client channel
        let call = ChannelMessage::method_call(&MethodCallPayload::new("getList"));
        transport.write_message(&call).await.unwrap();
        assert_eq!(client_rx.recv().await.unwrap(), call);

        // Server broadcasts reach the client
        let event = ChannelMessage::state_event(&StateEventPayload { state: 2 });
        server_tx.send(event.clone()).unwrap();
        assert_eq!(transport.read_message().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_tcp_transport_round_trip() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let transport = TcpTransport::from_stream(stream);
            transport.read_message().await.unwrap()
        });

        let client = TcpTransport::connect(&addr.to_string()).await.unwrap();
        let msg = ChannelMessage::method_call(&MethodCallPayload::new("close"));
        client.write_message(&msg).await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, msg);
        assert_eq!(received.event_type, EventType::MethodCall);
    }

    #[tokio::test]
    async fn test_tcp_close_signals_eof() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let transport = TcpTransport::from_stream(stream);
            transport.read_message().await
        });

        let client = TcpTransport::connect(&addr.to_string()).await.unwrap();
        client.close().await.unwrap();

        assert!(server.await.unwrap().is_err());
    }
}

//! Method channel endpoint
//!
//! Callers reach the bridge through a small message hub:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            ChannelServer                 │
//! │  ┌───────────────────────────────────┐  │
//! │  │ client_tx  (clients -> dispatch)  │  │
//! │  │ server_tx  (results + events ->)  │  │
//! │  └───────────────────────────────────┘  │
//! └────────────────┬────────────────────────┘
//!                  │
//!         ┌────────┴────────┐
//!         │ Transport Trait │
//!         └────────┬────────┘
//!                  │
//!          ┌───────┴───────┐
//!          ▼               ▼
//!     TcpTransport   MemoryTransport
//!     (socket)       (same process)
//! ```
//!
//! Method results are broadcast on `server_tx` with the correlation id of
//! the call they answer; each client picks out its own replies.

use shared::channel::{ChannelMessage, MemoryTransport, TcpTransport, Transport};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::core::{BridgeError, BridgeResult};

pub mod dispatch;
pub mod handler;

pub use dispatch::Dispatcher;
pub use handler::ChannelHandler;

/// Configuration for the channel endpoint
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub tcp_listen_addr: String,
    /// Capacity of the broadcast channels (default: 1024)
    pub channel_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            tcp_listen_addr: "127.0.0.1:9110".to_string(),
            channel_capacity: 1024,
        }
    }
}

/// Message hub connecting caller transports to the dispatch loop
#[derive(Debug, Clone)]
pub struct ChannelServer {
    client_tx: broadcast::Sender<ChannelMessage>,
    server_tx: broadcast::Sender<ChannelMessage>,
    config: ChannelConfig,
    shutdown_token: CancellationToken,
}

impl ChannelServer {
    /// Create a new channel server with default configuration
    pub fn new() -> Self {
        Self::from_config(ChannelConfig::default())
    }

    /// Create a new channel server from configuration
    pub fn from_config(config: ChannelConfig) -> Self {
        let capacity = config.channel_capacity;
        let (client_tx, _) = broadcast::channel(capacity);
        let (server_tx, _) = broadcast::channel(capacity);
        Self {
            client_tx,
            server_tx,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Publish a message FROM SERVER to all subscribers (broadcast)
    pub async fn publish(&self, msg: ChannelMessage) -> BridgeResult<()> {
        self.server_tx
            .send(msg)
            .map_err(|e| BridgeError::internal(e.to_string()))?;
        Ok(())
    }

    /// Send a message TO SERVER (from an in-process client)
    pub async fn send_to_server(&self, msg: ChannelMessage) -> BridgeResult<()> {
        self.client_tx
            .send(msg)
            .map_err(|e| BridgeError::internal(e.to_string()))?;
        Ok(())
    }

    /// Subscribe to messages FROM CLIENTS (dispatch loop uses this)
    pub fn subscribe_to_clients(&self) -> broadcast::Receiver<ChannelMessage> {
        self.client_tx.subscribe()
    }

    /// Subscribe to broadcasts FROM SERVER (clients use this)
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelMessage> {
        self.server_tx.subscribe()
    }

    /// Get a memory transport for in-process listening
    pub fn memory_transport(&self) -> MemoryTransport {
        MemoryTransport::new(&self.server_tx)
    }

    /// Get a client memory transport that can also send to the server
    pub fn client_memory_transport(&self) -> MemoryTransport {
        MemoryTransport::with_client_sender(&self.server_tx, &self.client_tx)
    }

    /// Get the sender clients use to reach the server
    pub fn sender_to_server(&self) -> &broadcast::Sender<ChannelMessage> {
        &self.client_tx
    }

    /// Get the server broadcast sender
    pub fn sender(&self) -> &broadcast::Sender<ChannelMessage> {
        &self.server_tx
    }

    /// Get the shutdown token (for monitoring shutdown signals)
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    /// Gracefully shut down the channel endpoint
    ///
    /// Cancels the TCP accept loop and every per-client task.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down method channel");
        self.shutdown_token.cancel();
    }

    /// Bind the configured address and serve until shutdown
    pub async fn start_tcp_server(&self) -> BridgeResult<()> {
        let listener = TcpListener::bind(&self.config.tcp_listen_addr)
            .await
            .map_err(|e| BridgeError::internal(format!("Failed to bind: {}", e)))?;

        tracing::info!(
            "Method channel TCP server listening on {}",
            self.config.tcp_listen_addr
        );

        self.serve_on(listener).await
    }

    /// Serve connections from an already-bound listener
    ///
    /// Each accepted client gets two tasks: one forwarding server
    /// broadcasts down its socket, one publishing its messages to
    /// `client_tx`. Both stop on socket error or shutdown.
    pub async fn serve_on(&self, listener: TcpListener) -> BridgeResult<()> {
        let server_tx = self.server_tx.clone();
        let client_tx = self.client_tx.clone();
        let shutdown_token = self.shutdown_token.clone();

        loop {
            tokio::select! {
                // Listen for shutdown signal
                _ = shutdown_token.cancelled() => {
                    tracing::info!("Method channel TCP server shutting down");
                    break;
                }

                // Accept new connections
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            tracing::info!("Client connected: {}", addr);

                            let server_tx = server_tx.clone();
                            let client_tx = client_tx.clone();
                            let shutdown_token = shutdown_token.clone();

                            tokio::spawn(async move {
                                let transport: Arc<dyn Transport> =
                                    Arc::new(TcpTransport::from_stream(stream));

                                let mut rx = server_tx.subscribe();
                                let transport_clone = transport.clone();
                                let client_shutdown = shutdown_token.clone();

                                // Forward server broadcasts to this client
                                tokio::spawn(async move {
                                    loop {
                                        tokio::select! {
                                            _ = client_shutdown.cancelled() => {
                                                tracing::info!("Client {} handler shutting down", addr);
                                                break;
                                            }

                                            msg_result = rx.recv() => {
                                                match msg_result {
                                                    Ok(msg) => {
                                                        if let Err(e) = transport_clone.write_message(&msg).await {
                                                            tracing::info!("Client {} disconnected: {}", addr, e);
                                                            break;
                                                        }
                                                    }
                                                    Err(_) => {
                                                        // Channel closed
                                                        break;
                                                    }
                                                }
                                            }
                                        }
                                    }
                                });

                                // Read messages from this client
                                let client_shutdown = shutdown_token.clone();
                                loop {
                                    tokio::select! {
                                        _ = client_shutdown.cancelled() => {
                                            break;
                                        }

                                        read_result = transport.read_message() => {
                                            match read_result {
                                                Ok(msg) => {
                                                    if let Err(e) = client_tx.send(msg) {
                                                        tracing::warn!("Failed to publish client message: {}", e);
                                                    }
                                                }
                                                Err(e) => {
                                                    tracing::info!("Client {} read error: {}", addr, e);
                                                    break;
                                                }
                                            }
                                        }
                                    }
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

impl Default for ChannelServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::channel::{EventType, StateEventPayload};

    #[tokio::test]
    async fn test_memory_transport_receives_broadcasts() {
        let server = ChannelServer::new();
        let transport = server.memory_transport();

        let msg = ChannelMessage::state_event(&StateEventPayload { state: 2 });
        server.publish(msg).await.unwrap();

        let received = transport.read_message().await.unwrap();
        assert_eq!(received.event_type, EventType::StateEvent);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_see_the_same_message() {
        let server = ChannelServer::new();
        let t1 = server.memory_transport();
        let t2 = server.memory_transport();

        let msg = ChannelMessage::state_event(&StateEventPayload { state: 0 });
        server.publish(msg).await.unwrap();

        assert_eq!(t1.read_message().await.unwrap().event_type, EventType::StateEvent);
        assert_eq!(t2.read_message().await.unwrap().event_type, EventType::StateEvent);
    }

    #[tokio::test]
    async fn test_client_memory_transport_reaches_server() {
        let server = ChannelServer::new();
        let mut from_clients = server.subscribe_to_clients();
        let transport = server.client_memory_transport();

        let msg = ChannelMessage::method_call(&shared::channel::MethodCallPayload::new("close"));
        transport.write_message(&msg).await.unwrap();

        assert_eq!(from_clients.recv().await.unwrap(), msg);
    }
}

//! Channel message handler
//!
//! The handler subscribes to the client side of the channel and drives the
//! method dispatcher. It is the only consumer of method calls, so every
//! call gets exactly one result, broadcast with the call's request id as
//! correlation id.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use shared::channel::{
    ChannelMessage, EventType, HandshakePayload, MethodCallPayload, MethodResultPayload,
    PROTOCOL_VERSION,
};

use crate::channel::Dispatcher;
use crate::core::PrinterSession;

/// Server-side handler for incoming channel messages
///
/// Runs in the background and processes all messages published by
/// connected clients.
pub struct ChannelHandler {
    receiver: broadcast::Receiver<ChannelMessage>,
    broadcast_tx: broadcast::Sender<ChannelMessage>,
    shutdown_token: CancellationToken,
    dispatcher: Dispatcher,
}

impl ChannelHandler {
    /// Create a handler dispatching against `session`
    pub fn new(
        receiver: broadcast::Receiver<ChannelMessage>,
        broadcast_tx: broadcast::Sender<ChannelMessage>,
        shutdown_token: CancellationToken,
        session: Arc<PrinterSession>,
    ) -> Self {
        Self {
            receiver,
            broadcast_tx,
            shutdown_token,
            dispatcher: Dispatcher::new(session),
        }
    }

    /// Start processing messages
    ///
    /// This is a long-running task that should be spawned in the background.
    pub async fn run(mut self) {
        tracing::info!("Channel handler started");

        loop {
            tokio::select! {
                // Listen for shutdown signal
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Channel handler shutting down");
                    break;
                }

                // Receive messages from clients
                msg_result = self.receiver.recv() => {
                    match msg_result {
                        Ok(msg) => {
                            self.handle_message(&msg).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!("Channel handler lagged, skipped {} messages", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("Channel closed");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Channel handler stopped");
    }

    async fn handle_message(&self, msg: &ChannelMessage) {
        match msg.event_type {
            EventType::Handshake => self.handle_handshake(msg),
            EventType::MethodCall => self.handle_method_call(msg).await,
            // Server-originated types; nothing to do for an echo
            EventType::MethodResult | EventType::StateEvent => {
                tracing::debug!(event_type = %msg.event_type, "Ignoring server-side event");
            }
        }
    }

    fn handle_handshake(&self, msg: &ChannelMessage) {
        match msg.parse_payload::<HandshakePayload>() {
            Ok(handshake) => {
                if handshake.version != PROTOCOL_VERSION {
                    tracing::warn!(
                        client_version = handshake.version,
                        server_version = PROTOCOL_VERSION,
                        "Client protocol version mismatch"
                    );
                }
                tracing::info!(
                    client = handshake.client_name.as_deref().unwrap_or("unknown"),
                    "Client handshake"
                );
            }
            Err(e) => {
                tracing::warn!("Malformed handshake payload: {}", e);
            }
        }
    }

    async fn handle_method_call(&self, msg: &ChannelMessage) {
        let result = match msg.parse_payload::<MethodCallPayload>() {
            Ok(call) => self.dispatcher.dispatch(&call).await,
            Err(e) => {
                tracing::warn!("Malformed method call payload: {}", e);
                MethodResultPayload::error("invalid_payload", e.to_string())
            }
        };

        let reply = ChannelMessage::method_result(&result, msg.request_id);
        if let Err(e) = self.broadcast_tx.send(reply) {
            tracing::warn!("Failed to broadcast method result: {}", e);
        }
    }
}

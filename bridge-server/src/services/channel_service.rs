use crate::channel::{ChannelConfig, ChannelHandler, ChannelServer};
use crate::core::{BridgeResult, Config, PrinterSession};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Method channel service
///
/// Wraps [`ChannelServer`] and provides:
/// - TCP server startup
/// - The background dispatch loop
/// - Lifecycle management
#[derive(Clone, Debug)]
pub struct ChannelService {
    server: Arc<ChannelServer>,
}

impl ChannelService {
    /// Create the channel service
    pub fn new(config: &Config) -> Self {
        let channel_config = ChannelConfig {
            tcp_listen_addr: config.listen_addr.clone(),
            channel_capacity: config.channel_capacity,
        };

        Self {
            server: Arc::new(ChannelServer::from_config(channel_config)),
        }
    }

    /// Get the channel server
    pub fn server(&self) -> &Arc<ChannelServer> {
        &self.server
    }

    /// Create a session wired to this service's event stream
    pub fn create_session(&self) -> Arc<PrinterSession> {
        Arc::new(PrinterSession::new(self.server.sender().clone()))
    }

    /// Start the background dispatch loop
    ///
    /// The handler subscribes to client messages and answers method calls
    /// against `session`.
    pub fn start_background_tasks(&self, session: Arc<PrinterSession>) {
        let handler = ChannelHandler::new(
            self.server.subscribe_to_clients(),
            self.server.sender().clone(),
            self.server.shutdown_token().clone(),
            session,
        );

        tokio::spawn(async move {
            handler.run().await;
        });

        tracing::debug!("Channel handler started in background");
    }

    /// Bind the configured address and serve until shutdown
    pub async fn start_tcp_server(&self) -> BridgeResult<()> {
        self.server.start_tcp_server().await
    }

    /// Serve connections from an already-bound listener
    pub async fn serve_on(&self, listener: TcpListener) -> BridgeResult<()> {
        self.server.serve_on(listener).await
    }

    /// Shut down the channel and every client task
    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}

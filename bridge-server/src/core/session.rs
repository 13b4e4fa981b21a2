//! Printer session state
//!
//! A session owns at most one active printer link at a time. Links come in
//! two families that are managed independently, mirroring how callers use
//! them:
//!
//! - **Print links** (`connectPrinter`/`close`): a spooler queue or a raw
//!   network socket, used by `printBytes`, `printText`, `printRawData`.
//! - **Bluetooth links** (`onStartConnection`/`disconnect`): an RFCOMM
//!   device, used by `sendDataByte`, `sendText`.
//!
//! Connecting a new link replaces whatever the session held before.
//! Every transition is broadcast to channel subscribers as a numeric
//! state event (0 = none/failed, 1 = connecting, 2 = connected).

use printer_core::{NetworkPrinter, Printer, RfcommPrinter, SpoolerPrinter};
use shared::channel::{ChannelMessage, StateEventPayload};
use shared::model::ConnectionState;
use tokio::sync::{RwLock, broadcast};

/// The one printer link a session may hold
enum ActiveLink {
    /// OS print queue, addressed by name
    Spooler(SpoolerPrinter),
    /// Raw TCP printer, addressed by host:port
    Network(NetworkPrinter),
    /// Bound RFCOMM device, addressed by MAC
    Rfcomm(RfcommPrinter),
}

impl ActiveLink {
    fn is_print_link(&self) -> bool {
        matches!(self, ActiveLink::Spooler(_) | ActiveLink::Network(_))
    }
}

/// Session state shared by all channel clients
///
/// All methods return plain booleans: callers on the method channel never
/// see printer errors, only whether the operation took effect.
pub struct PrinterSession {
    link: RwLock<Option<ActiveLink>>,
    events: broadcast::Sender<ChannelMessage>,
}

impl PrinterSession {
    /// Create a session that broadcasts state events on `events`
    pub fn new(events: broadcast::Sender<ChannelMessage>) -> Self {
        Self {
            link: RwLock::new(None),
            events,
        }
    }

    /// Whether the session currently holds any link
    pub async fn is_connected(&self) -> bool {
        self.link.read().await.is_some()
    }

    /// Connect to a printer by target string
    ///
    /// A `host:port` target opens a raw network link; anything else is
    /// treated as a spooler queue name. An empty target selects the
    /// platform default printer. The link is probed before it is stored,
    /// so a `true` result means the printer answered.
    pub async fn connect_printer(&self, target: &str) -> bool {
        self.emit_state(ConnectionState::Connecting);

        let target = if target.is_empty() {
            match self.default_printer().await {
                Some(name) => {
                    tracing::debug!(printer = %name, "Using default printer");
                    name
                }
                None => {
                    self.emit_state(ConnectionState::Failed);
                    return false;
                }
            }
        } else {
            target.to_string()
        };

        let link = if let Ok(printer) = NetworkPrinter::from_addr(&target) {
            match printer.probe().await {
                Ok(()) => ActiveLink::Network(printer),
                Err(e) => {
                    tracing::warn!(addr = %target, error = %e, "Network printer unreachable");
                    self.emit_state(ConnectionState::Failed);
                    return false;
                }
            }
        } else {
            let printer = SpoolerPrinter::new(&target);
            match printer.probe().await {
                Ok(()) => ActiveLink::Spooler(printer),
                Err(e) => {
                    tracing::warn!(printer = %target, error = %e, "Printer queue not available");
                    self.emit_state(ConnectionState::Failed);
                    return false;
                }
            }
        };

        self.store_link(link).await;
        tracing::info!(printer = %target, "Printer connected");
        self.emit_state(ConnectionState::Connected);
        true
    }

    /// Resolve the platform default printer name
    async fn default_printer(&self) -> Option<String> {
        match tokio::task::spawn_blocking(SpoolerPrinter::default_printer).await {
            Ok(Ok(Some(name))) => Some(name),
            Ok(Ok(None)) => {
                tracing::warn!("No default printer configured");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Default printer lookup failed");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Default printer lookup task failed");
                None
            }
        }
    }

    /// Close the current print link
    ///
    /// Always reports `true`: closing an already-closed session is not an
    /// error. A bluetooth link, if held, is left untouched.
    pub async fn close(&self) -> bool {
        let mut guard = self.link.write().await;
        if matches!(guard.as_ref(), Some(link) if link.is_print_link()) {
            *guard = None;
            drop(guard);
            tracing::info!("Printer connection closed");
            self.emit_state(ConnectionState::None);
        }
        true
    }

    /// Connect to a paired bluetooth printer by MAC address
    ///
    /// Resolves the RFCOMM device bound to the address and probes it.
    /// `auto_connect` is accepted for API compatibility but RFCOMM links
    /// are always connected eagerly.
    pub async fn connect_bluetooth(&self, address: &str, auto_connect: bool) -> bool {
        tracing::debug!(address = %address, auto_connect, "Bluetooth connection requested");
        self.emit_state(ConnectionState::Connecting);

        let resolved = tokio::task::spawn_blocking({
            let address = address.to_string();
            move || RfcommPrinter::for_address(&address)
        })
        .await;

        let printer = match resolved {
            Ok(Ok(printer)) => printer,
            Ok(Err(e)) => {
                tracing::warn!(address = %address, error = %e, "Bluetooth device not available");
                self.emit_state(ConnectionState::Failed);
                return false;
            }
            Err(e) => {
                tracing::error!(error = %e, "Bluetooth resolve task failed");
                self.emit_state(ConnectionState::Failed);
                return false;
            }
        };

        if let Err(e) = printer.probe().await {
            tracing::warn!(address = %address, error = %e, "Bluetooth device not writable");
            self.emit_state(ConnectionState::Failed);
            return false;
        }

        tracing::info!(address = %address, device = %printer.device(), "Bluetooth printer connected");
        self.store_link(ActiveLink::Rfcomm(printer)).await;
        self.emit_state(ConnectionState::Connected);
        true
    }

    /// Drop the current bluetooth link
    ///
    /// Always reports `true`. A print link, if held, is left untouched.
    pub async fn disconnect(&self) -> bool {
        let mut guard = self.link.write().await;
        if matches!(guard.as_ref(), Some(ActiveLink::Rfcomm(_))) {
            *guard = None;
            drop(guard);
            tracing::info!("Bluetooth connection closed");
            self.emit_state(ConnectionState::None);
        }
        true
    }

    /// Send bytes to the connected print link
    ///
    /// Reports `false` when no print link is held or the write fails.
    pub async fn print_job(&self, data: &[u8]) -> bool {
        let guard = self.link.read().await;
        match guard.as_ref() {
            Some(ActiveLink::Spooler(printer)) => self.deliver(printer, data).await,
            Some(ActiveLink::Network(printer)) => self.deliver(printer, data).await,
            _ => {
                tracing::warn!("No printer connected, dropping print job");
                false
            }
        }
    }

    /// Send bytes to the connected bluetooth link
    ///
    /// Reports `false` when no bluetooth link is held or the write fails.
    pub async fn send_bluetooth(&self, data: &[u8]) -> bool {
        let guard = self.link.read().await;
        match guard.as_ref() {
            Some(ActiveLink::Rfcomm(printer)) => self.deliver(printer, data).await,
            _ => {
                tracing::warn!("No bluetooth device connected, dropping data");
                false
            }
        }
    }

    async fn deliver<P: Printer>(&self, printer: &P, data: &[u8]) -> bool {
        match printer.print(data).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Print delivery failed");
                false
            }
        }
    }

    async fn store_link(&self, link: ActiveLink) {
        let mut guard = self.link.write().await;
        if guard.is_some() {
            tracing::debug!("Replacing previous printer link");
        }
        *guard = Some(link);
    }

    fn emit_state(&self, state: ConnectionState) {
        let msg = ChannelMessage::state_event(&StateEventPayload::from(state));
        if let Err(e) = self.events.send(msg) {
            tracing::debug!("No subscribers for state event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::channel::EventType;

    fn session_with_events() -> (PrinterSession, broadcast::Receiver<ChannelMessage>) {
        let (tx, rx) = broadcast::channel(16);
        (PrinterSession::new(tx), rx)
    }

    async fn next_state(rx: &mut broadcast::Receiver<ChannelMessage>) -> u8 {
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.event_type, EventType::StateEvent);
        msg.parse_payload::<StateEventPayload>().unwrap().state
    }

    #[tokio::test]
    async fn test_starts_disconnected() {
        let (session, _rx) = session_with_events();
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn test_close_without_connection_reports_true() {
        let (session, mut rx) = session_with_events();
        assert!(session.close().await);
        // No transition happened, so no event was broadcast
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_without_connection_reports_true() {
        let (session, mut rx) = session_with_events();
        assert!(session.disconnect().await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_print_without_connection_reports_false() {
        let (session, _rx) = session_with_events();
        assert!(!session.print_job(b"\x1b@").await);
        assert!(!session.send_bluetooth(b"\x1b@").await);
    }

    #[tokio::test]
    async fn test_failed_connect_emits_connecting_then_failed() {
        let (session, mut rx) = session_with_events();

        // Ephemeral port that was bound and released, so nothing listens
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(!session.connect_printer(&addr.to_string()).await);
        assert_eq!(next_state(&mut rx).await, 1);
        assert_eq!(next_state(&mut rx).await, 0);
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn test_network_connect_emits_connected() {
        let (session, mut rx) = session_with_events();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        assert!(session.connect_printer(&addr.to_string()).await);
        assert_eq!(next_state(&mut rx).await, 1);
        assert_eq!(next_state(&mut rx).await, 2);
        assert!(session.is_connected().await);

        // close drops the network link and reports the transition
        assert!(session.close().await);
        assert_eq!(next_state(&mut rx).await, 0);
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn test_disconnect_leaves_print_link_alone() {
        let (session, _rx) = session_with_events();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        assert!(session.connect_printer(&addr.to_string()).await);
        assert!(session.disconnect().await);
        assert!(session.is_connected().await, "print link must survive disconnect");
    }

    #[tokio::test]
    async fn test_bluetooth_connect_with_invalid_address_fails() {
        let (session, mut rx) = session_with_events();
        assert!(!session.connect_bluetooth("not-a-mac", false).await);
        assert_eq!(next_state(&mut rx).await, 1);
        assert_eq!(next_state(&mut rx).await, 0);
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_empty_target_needs_a_default_printer() {
        // Without a spooler there is no default printer to fall back to
        let (session, mut rx) = session_with_events();
        assert!(!session.connect_printer("").await);
        assert_eq!(next_state(&mut rx).await, 1);
        assert_eq!(next_state(&mut rx).await, 0);
    }
}

//! Network printing over raw TCP (JetDirect style, port 9100)

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, instrument};

use crate::error::{PrintError, PrintResult};
use crate::Printer;

/// Conventional raw printing port
pub const DEFAULT_PORT: u16 = 9100;

/// Default connect timeout for print jobs
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect timeout for reachability checks
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Network thermal printer addressed as `ip:port`
#[derive(Debug)]
pub struct NetworkPrinter {
    addr: SocketAddr,
    timeout: Duration,
}

impl NetworkPrinter {
    /// Create a printer for `host` on the given port
    pub fn new(host: &str, port: u16) -> PrintResult<Self> {
        let addr = format!("{}:{}", host, port).parse().map_err(|e| {
            PrintError::InvalidAddress(format!("Invalid address {}:{}: {}", host, port, e))
        })?;

        Ok(Self {
            addr,
            timeout: CONNECT_TIMEOUT,
        })
    }

    /// Create a printer from a full `ip:port` address string
    pub fn from_addr(addr: &str) -> PrintResult<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| PrintError::InvalidAddress(format!("Invalid address {}: {}", addr, e)))?;

        Ok(Self {
            addr,
            timeout: CONNECT_TIMEOUT,
        })
    }

    /// Override the connect timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Open and immediately close a connection to verify the device accepts us.
    ///
    /// Used when a link is established, before any job is sent.
    pub async fn probe(&self) -> PrintResult<()> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| PrintError::Timeout(format!("Connection to {} timed out", self.addr)))?
            .map_err(|e| PrintError::Connection(format!("Failed to connect to {}: {}", self.addr, e)))?;

        drop(stream);
        Ok(())
    }
}

impl Printer for NetworkPrinter {
    #[instrument(skip(data), fields(addr = %self.addr, data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        info!("Connecting to printer");

        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| PrintError::Timeout(format!("Connection to {} timed out", self.addr)))?
            .map_err(|e| PrintError::Connection(format!("Failed to connect to {}: {}", self.addr, e)))?;

        stream.write_all(data).await?;
        stream.flush().await?;

        info!("Print data sent");
        Ok(())
    }

    async fn is_online(&self) -> bool {
        matches!(
            tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(self.addr)).await,
            Ok(Ok(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_printer_creation() {
        let printer = NetworkPrinter::new("192.168.1.100", DEFAULT_PORT).unwrap();
        assert_eq!(printer.addr().port(), 9100);

        assert!(NetworkPrinter::new("not an ip", 9100).is_err());
        assert!(NetworkPrinter::from_addr("10.0.0.5:9100").is_ok());
        assert!(NetworkPrinter::from_addr("10.0.0.5").is_err()); // port required
    }

    #[tokio::test]
    async fn test_print_sends_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let printer = NetworkPrinter::from_addr(&addr.to_string()).unwrap();
        printer.print(&[0x1b, 0x40, 0x0a]).await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, vec![0x1b, 0x40, 0x0a]);
    }

    #[tokio::test]
    async fn test_probe_reports_reachability() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let printer = NetworkPrinter::from_addr(&addr.to_string()).unwrap();
        assert!(printer.probe().await.is_ok());
        assert!(printer.is_online().await);

        // Free the port, then expect refusal
        drop(listener);
        let printer = NetworkPrinter::from_addr(&addr.to_string())
            .unwrap()
            .with_timeout(Duration::from_millis(500));
        assert!(printer.probe().await.is_err());
    }
}

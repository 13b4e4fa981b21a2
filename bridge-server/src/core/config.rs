/// Server configuration
///
/// # Environment variables
///
/// All settings can be overridden through environment variables:
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | CHANNEL_LISTEN_ADDR | 127.0.0.1:9110 | Method channel TCP listen address |
/// | CHANNEL_CAPACITY | 1024 | Broadcast channel capacity |
/// | LOG_LEVEL | info | Log level filter |
/// | LOG_DIR | (unset) | Directory for daily log files, console-only if unset |
///
/// # Example
///
/// ```ignore
/// CHANNEL_LISTEN_ADDR=0.0.0.0:9110 LOG_LEVEL=debug cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP listen address for the method channel
    pub listen_addr: String,
    /// Capacity of the channel broadcast queues
    pub channel_capacity: usize,
    /// Log level filter
    pub log_level: String,
    /// Optional directory for rolling log files
    pub log_dir: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables fall back to defaults.
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("CHANNEL_LISTEN_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:9110".into()),
            channel_capacity: std::env::var("CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok(),
        }
    }

    /// Override the listen address
    ///
    /// Used by tests to bind ephemeral ports.
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

//! Printer Bridge Server
//!
//! # Overview
//!
//! Exposes platform printers over a small method channel. Callers send
//! named method calls (`getList`, `connectPrinter`, `printBytes`, ...)
//! with argument maps and get correlated results back; connection-state
//! changes are broadcast to every subscriber.
//!
//! Three printer backends sit behind one session:
//!
//! - OS spooler queues (RAW datatype)
//! - Raw network printers (JetDirect port 9100)
//! - Paired bluetooth printers (bound RFCOMM devices)
//!
//! # Module structure
//!
//! ```text
//! bridge-server/src/
//! ├── core/          # Configuration, errors, session state
//! ├── channel/       # Method channel: hub, handler, dispatch table
//! ├── services/      # Channel lifecycle
//! └── utils/         # Logging, environment setup
//! ```

pub mod channel;
pub mod core;
pub mod services;
pub mod utils;

// Re-export public types
pub use channel::{ChannelConfig, ChannelHandler, ChannelServer, Dispatcher};
pub use core::{BridgeError, BridgeResult, Config, PrinterSession};
pub use services::ChannelService;
pub use shared::channel::{ChannelMessage, EventType};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
pub use utils::setup_environment;

pub fn print_banner() {
    println!(
        r#"
    ____       _       __
   / __ \_____(_)___  / /____  _____
  / /_/ / ___/ / __ \/ __/ _ \/ ___/
 / ____/ /  / / / / / /_/  __/ /
/_/   /_/  /_/_/ /_/\__/\___/_/
    ____       _     __
   / __ )_____(_)___/ /___ ____
  / __  / ___/ / __  / __ `/ _ \
 / /_/ / /  / / /_/ / /_/ /  __/
/_____/_/  /_/\__,_/\__, /\___/
                   /____/
    "#
    );
}

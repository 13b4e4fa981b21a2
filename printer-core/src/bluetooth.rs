//! Bluetooth SPP printing over RFCOMM
//!
//! Printers paired over Bluetooth Serial Port Profile are reached through a
//! bound RFCOMM device node (`/dev/rfcommN`). The node must already exist;
//! binding is system setup, not something this crate does:
//!
//! ```bash
//! $ bluetoothctl pair 00:11:62:XX:XX:XX
//! $ sudo rfcomm bind 0 00:11:62:XX:XX:XX
//! ```
//!
//! The device is opened in raw TTY mode so binary data passes through
//! unmodified, and large jobs are written in chunks with a short delay to
//! avoid overrunning the Bluetooth buffer.

use std::path::Path;
use std::time::Duration;

use shared::model::BluetoothDevice;
use tracing::{debug, info, instrument};

use crate::error::{PrintError, PrintResult};
use crate::Printer;

/// Write chunk size for RFCOMM devices (bytes)
const CHUNK_SIZE: usize = 4096;

/// Delay between chunks (milliseconds)
const CHUNK_DELAY_MS: u64 = 2;

/// Validate a Bluetooth MAC address.
///
/// Six hex octet pairs; `:` and `-` separators are both accepted, mixed
/// forms included.
pub fn is_valid_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(|c| c == ':' || c == '-').collect();
    if parts.len() != 6 {
        return false;
    }
    parts
        .iter()
        .all(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// List devices the system has paired, whether or not they are in range.
///
/// Queries `bluetoothctl`; platforms without it report an empty list.
#[cfg(unix)]
pub fn paired_devices() -> PrintResult<Vec<BluetoothDevice>> {
    use std::process::Command;

    let output = Command::new("bluetoothctl")
        .args(["devices", "Paired"])
        .output();

    let mut devices = match output {
        Ok(output) => parse_device_list(&String::from_utf8_lossy(&output.stdout)),
        Err(e) => {
            debug!("bluetoothctl not available: {}", e);
            return Ok(Vec::new());
        }
    };

    // Older bluez spells the subcommand differently
    if devices.is_empty() {
        if let Ok(output) = Command::new("bluetoothctl").arg("paired-devices").output() {
            devices = parse_device_list(&String::from_utf8_lossy(&output.stdout));
        }
    }

    Ok(devices)
}

#[cfg(not(unix))]
pub fn paired_devices() -> PrintResult<Vec<BluetoothDevice>> {
    Ok(Vec::new())
}

/// Parse `bluetoothctl devices` output: one `Device <MAC> <Name>` per line
fn parse_device_list(output: &str) -> Vec<BluetoothDevice> {
    let mut devices = Vec::new();

    for line in output.lines() {
        let rest = match line.trim().strip_prefix("Device ") {
            Some(rest) => rest,
            None => continue,
        };

        let (address, name) = match rest.split_once(' ') {
            Some((address, name)) => (address, name.trim()),
            None => (rest, ""),
        };

        if !is_valid_mac(address) {
            continue;
        }

        let name = if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        };
        devices.push(BluetoothDevice::new(name, address));
    }

    devices
}

/// Find the RFCOMM device bound to a MAC address.
///
/// Checks `/proc/net/rfcomm` first, then `rfcomm -a`. Returns the device
/// path (e.g. "/dev/rfcomm0") if one exists.
#[cfg(unix)]
pub fn find_rfcomm_for_mac(mac: &str) -> PrintResult<Option<String>> {
    use std::fs;
    use std::process::Command;

    if let Ok(contents) = fs::read_to_string("/proc/net/rfcomm") {
        if let Some(dev_name) = scan_rfcomm_table(&contents, mac) {
            let device_path = format!("/dev/{}", dev_name);
            if Path::new(&device_path).exists() {
                return Ok(Some(device_path));
            }
        }
    }

    // Fallback: ask the rfcomm tool; absent tool means no binding to find
    let output = match Command::new("rfcomm").arg("-a").output() {
        Ok(output) => output,
        Err(e) => {
            debug!("rfcomm tool not available: {}", e);
            return Ok(None);
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    if let Some(dev_name) = scan_rfcomm_table(&stdout, mac) {
        let device_path = format!("/dev/{}", dev_name);
        if Path::new(&device_path).exists() {
            return Ok(Some(device_path));
        }
    }

    Ok(None)
}

#[cfg(not(unix))]
pub fn find_rfcomm_for_mac(_mac: &str) -> PrintResult<Option<String>> {
    Ok(None)
}

/// Scan an rfcomm listing for a MAC, returning the device name.
///
/// Lines look like `rfcomm0: 00:11:62:AA:BB:CC channel 1 connected [...]`.
fn scan_rfcomm_table(contents: &str, mac: &str) -> Option<String> {
    let mac_upper = mac.to_uppercase().replace('-', ":");

    for line in contents.lines() {
        if !line.to_uppercase().contains(&mac_upper) {
            continue;
        }
        if let Some(dev_name) = line.split(':').next() {
            return Some(dev_name.trim().to_string());
        }
    }

    None
}

/// Bluetooth SPP printer reached through a bound RFCOMM device
#[derive(Debug)]
pub struct RfcommPrinter {
    address: String,
    device: String,
    chunk_size: usize,
    chunk_delay: Duration,
}

impl RfcommPrinter {
    /// Resolve a MAC address to its bound RFCOMM device.
    ///
    /// Fails when the address is malformed or no binding exists.
    pub fn for_address(address: &str) -> PrintResult<Self> {
        if !is_valid_mac(address) {
            return Err(PrintError::InvalidAddress(format!(
                "Bad bluetooth address: {}",
                address
            )));
        }

        let device = find_rfcomm_for_mac(address)?.ok_or_else(|| {
            PrintError::Connection(format!("No RFCOMM device bound to {}", address))
        })?;

        Ok(Self {
            address: address.to_uppercase().replace('-', ":"),
            device,
            chunk_size: CHUNK_SIZE,
            chunk_delay: Duration::from_millis(CHUNK_DELAY_MS),
        })
    }

    /// Use a device node directly, bypassing MAC resolution
    pub fn from_device(device: impl Into<String>) -> Self {
        Self {
            address: String::new(),
            device: device.into(),
            chunk_size: CHUNK_SIZE,
            chunk_delay: Duration::from_millis(CHUNK_DELAY_MS),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Set the chunk size for large writes
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set the delay between chunks
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Open and close the device to verify it accepts writers.
    ///
    /// Called when a link is established, before any job is sent.
    pub async fn probe(&self) -> PrintResult<()> {
        let device = self.device.clone();

        tokio::task::spawn_blocking(move || open_raw(&device).map(|_| ()))
            .await
            .map_err(|e| PrintError::Connection(format!("Task join failed: {}", e)))?
    }
}

impl Printer for RfcommPrinter {
    #[instrument(skip(data), fields(device = %self.device, data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        info!("Writing to bluetooth printer");

        // File IO and inter-chunk sleeps are blocking
        let device = self.device.clone();
        let data = data.to_vec();
        let chunk_size = self.chunk_size;
        let chunk_delay = self.chunk_delay;

        tokio::task::spawn_blocking(move || write_chunked(&device, &data, chunk_size, chunk_delay))
            .await
            .map_err(|e| PrintError::Connection(format!("Task join failed: {}", e)))?
    }

    async fn is_online(&self) -> bool {
        Path::new(&self.device).exists()
    }
}

/// Open a device for writing and put the TTY in raw mode
#[cfg(unix)]
fn open_raw(device: &str) -> PrintResult<std::fs::File> {
    use std::fs::OpenOptions;
    use std::os::unix::io::AsRawFd;

    let file = OpenOptions::new()
        .write(true)
        .open(device)
        .map_err(|e| PrintError::Connection(format!("Failed to open {}: {}", device, e)))?;

    configure_tty_raw(file.as_raw_fd())?;

    Ok(file)
}

#[cfg(not(unix))]
fn open_raw(device: &str) -> PrintResult<std::fs::File> {
    Err(PrintError::Unsupported(format!(
        "No RFCOMM backend for device: {}",
        device
    )))
}

/// Write a job in chunks with a pause between them
#[cfg(unix)]
fn write_chunked(
    device: &str,
    data: &[u8],
    chunk_size: usize,
    chunk_delay: Duration,
) -> PrintResult<()> {
    use std::io::Write;

    let mut file = open_raw(device)?;

    if data.len() <= chunk_size {
        file.write_all(data)?;
    } else {
        for chunk in data.chunks(chunk_size) {
            file.write_all(chunk)?;

            if !chunk_delay.is_zero() {
                std::thread::sleep(chunk_delay);
            }
        }
    }

    file.flush()?;
    Ok(())
}

#[cfg(not(unix))]
fn write_chunked(
    device: &str,
    _data: &[u8],
    _chunk_size: usize,
    _chunk_delay: Duration,
) -> PrintResult<()> {
    Err(PrintError::Unsupported(format!(
        "No RFCOMM backend for device: {}",
        device
    )))
}

/// Configure a file descriptor for raw TTY mode.
///
/// Disables all input/output processing so binary data passes through
/// unmodified. IXON/IXOFF matter most: 0x11 (XON) and 0x13 (XOFF) show up
/// in raster data and would otherwise stall the stream. Descriptors that
/// are not TTYs (regular files, pipes) are left as they are.
#[cfg(unix)]
fn configure_tty_raw(fd: i32) -> PrintResult<()> {
    use std::io;
    use std::mem::MaybeUninit;

    let mut termios = MaybeUninit::uninit();
    let result = unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) };
    if result != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ENOTTY) {
            return Ok(());
        }
        return Err(PrintError::Connection(format!("tcgetattr failed: {}", err)));
    }
    let mut termios = unsafe { termios.assume_init() };

    // Input flags: no break/parity handling, no CR/LF mangling, and no
    // XON/XOFF flow control
    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);

    // Output flags: disable post-processing
    termios.c_oflag &= !libc::OPOST;

    // Local flags: disable echo, canonical mode, signals
    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);

    // Control flags: 8-bit characters, no parity
    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8;

    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) };
    if result != 0 {
        return Err(PrintError::Connection(format!(
            "tcsetattr failed: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_mac_addresses() {
        assert!(is_valid_mac("00:11:22:33:44:55"));
        assert!(is_valid_mac("AA:BB:CC:DD:EE:FF"));
        assert!(is_valid_mac("aa:bb:cc:dd:ee:ff"));
        assert!(is_valid_mac("00-11-62-AA-BB-CC")); // dash form
        assert!(is_valid_mac("00:11-22:33-44:55")); // mixed separators
    }

    #[test]
    fn test_invalid_mac_addresses() {
        assert!(!is_valid_mac("00:11:22:33:44")); // too short
        assert!(!is_valid_mac("00:11:22:33:44:55:66")); // too long
        assert!(!is_valid_mac("GG:HH:II:JJ:KK:LL")); // invalid hex
        assert!(!is_valid_mac("001122334455")); // no separators
        assert!(!is_valid_mac(""));
        assert!(!is_valid_mac("not-a-mac"));
    }

    #[test]
    fn test_scan_rfcomm_table() {
        let table = "rfcomm0: 00:11:62:AA:BB:CC channel 1 connected [reuse-dlc release-on-hup]\n\
                     rfcomm1: 11:22:33:44:55:66 channel 2 clean\n";

        assert_eq!(
            scan_rfcomm_table(table, "00:11:62:aa:bb:cc").as_deref(),
            Some("rfcomm0")
        );
        assert_eq!(
            scan_rfcomm_table(table, "11:22:33:44:55:66").as_deref(),
            Some("rfcomm1")
        );
        // Dash-form query matches the colon-form table
        assert_eq!(
            scan_rfcomm_table(table, "00-11-62-AA-BB-CC").as_deref(),
            Some("rfcomm0")
        );
        assert!(scan_rfcomm_table(table, "FF:FF:FF:FF:FF:FF").is_none());
        assert!(scan_rfcomm_table("", "00:11:62:AA:BB:CC").is_none());
    }

    #[test]
    fn test_parse_device_list() {
        let output = "Device 00:11:62:AA:BB:CC TSP650II\n\
                      Device 11:22:33:44:55:66 Kitchen Printer 2\n\
                      Device 22:33:44:55:66:77\n\
                      [NEW] Controller AA:BB:CC:DD:EE:FF host\n";

        let devices = parse_device_list(output);
        assert_eq!(devices.len(), 3);

        assert_eq!(devices[0].address, "00:11:62:AA:BB:CC");
        assert_eq!(devices[0].name, "TSP650II");
        assert_eq!(devices[1].name, "Kitchen Printer 2");
        // Nameless device falls back to its address
        assert_eq!(devices[2].name, "22:33:44:55:66:77");
    }

    #[test]
    fn test_parse_device_list_empty() {
        assert!(parse_device_list("").is_empty());
        assert!(parse_device_list("No default controller available\n").is_empty());
    }

    #[test]
    fn test_for_address_rejects_bad_mac() {
        let err = RfcommPrinter::for_address("kitchen").unwrap_err();
        assert!(matches!(err, PrintError::InvalidAddress(_)));
    }

    #[test]
    fn test_for_address_without_binding() {
        // Valid address, but nothing bound to it on this machine
        assert!(RfcommPrinter::for_address("00:11:62:00:00:01").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_chunked_write_preserves_bytes() {
        use std::io::Read;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rfcomm-stand-in");
        std::fs::File::create(&path).unwrap();

        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let printer = RfcommPrinter::from_device(path.to_string_lossy().to_string())
            .with_chunk_size(256)
            .with_chunk_delay(Duration::ZERO);

        printer.print(&data).await.unwrap();
        assert!(printer.is_online().await);

        let mut written = Vec::new();
        std::fs::File::open(&path)
            .unwrap()
            .read_to_end(&mut written)
            .unwrap();
        assert_eq!(written, data);
    }

    #[tokio::test]
    async fn test_missing_device_is_offline() {
        let printer = RfcommPrinter::from_device("/dev/rfcomm-does-not-exist");
        assert!(!printer.is_online().await);
        assert!(printer.probe().await.is_err());
    }
}

//! OS spooler printing
//!
//! Printers installed in the system spooler are addressed by queue name and
//! written with the RAW datatype, bypassing any driver rendering. Only
//! Windows has a spooler backend; elsewhere listing is empty and writes
//! report `Unsupported`.

use shared::model::PrinterDescriptor;

use crate::error::{PrintError, PrintResult};
use crate::Printer;

/// Spooler printer addressed by queue name
pub struct SpoolerPrinter {
    name: String,
}

impl SpoolerPrinter {
    /// Create a printer with a specific queue name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Get the queue name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// List installed printers with driver and state information
    pub fn list() -> PrintResult<Vec<PrinterDescriptor>> {
        platform::list_printers()
    }

    /// Get the default printer name
    pub fn default_printer() -> PrintResult<Option<String>> {
        platform::default_printer()
    }

    /// Verify the queue exists and hands out a handle.
    ///
    /// Called when a link is established, before any job is sent.
    pub async fn probe(&self) -> PrintResult<()> {
        let name = self.name.clone();

        tokio::task::spawn_blocking(move || platform::open_check(&name))
            .await
            .map_err(|e| PrintError::Connection(format!("Task join failed: {}", e)))?
    }
}

impl Printer for SpoolerPrinter {
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        // Spooler calls are synchronous, run in blocking task
        let name = self.name.clone();
        let data = data.to_vec();

        tokio::task::spawn_blocking(move || platform::write_raw(&name, &data))
            .await
            .map_err(|e| PrintError::Connection(format!("Task join failed: {}", e)))?
    }

    async fn is_online(&self) -> bool {
        let name = self.name.clone();

        tokio::task::spawn_blocking(move || platform::check_online(&name).unwrap_or(false))
            .await
            .unwrap_or(false)
    }
}

/// Check if a port belongs to a virtual print target (PDF, XPS, OneNote...)
fn is_virtual_port(port: &str) -> bool {
    let p = port.to_lowercase();
    p == "file:"
        || p == "portprompt:"
        || p == "xpsport:"
        || p.starts_with("onenote")
        || p == "nul:"
        || p.starts_with("wfsport:")
}

#[cfg(windows)]
mod platform {
    use shared::model::PrinterDescriptor;
    use tracing::debug;

    use super::is_virtual_port;
    use crate::error::{PrintError, PrintResult};

    fn to_wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    /// Enumerate spooler queues at detail level 2 (name, driver, port, state)
    pub fn list_printers() -> PrintResult<Vec<PrinterDescriptor>> {
        use windows::Win32::Graphics::Printing::{
            EnumPrintersW, PRINTER_ATTRIBUTE_WORK_OFFLINE, PRINTER_ENUM_CONNECTIONS,
            PRINTER_ENUM_LOCAL, PRINTER_INFO_2W, PRINTER_STATUS_OFFLINE,
        };
        use windows::core::PWSTR;

        let default_name = default_printer()?.unwrap_or_default();

        unsafe {
            let flags = PRINTER_ENUM_LOCAL | PRINTER_ENUM_CONNECTIONS;
            let mut needed: u32 = 0;
            let mut returned: u32 = 0;

            let _ = EnumPrintersW(flags, None, 2, None, &mut needed, &mut returned);

            if needed == 0 {
                return Ok(Vec::new());
            }

            let mut buf: Vec<u8> = vec![0; needed as usize];
            EnumPrintersW(
                flags,
                None,
                2,
                Some(buf.as_mut_slice()),
                &mut needed,
                &mut returned,
            )
            .map_err(|_| PrintError::Spooler("EnumPrintersW failed".to_string()))?;

            let ptr = buf.as_ptr() as *const PRINTER_INFO_2W;
            let slice = std::slice::from_raw_parts(ptr, returned as usize);

            let mut result: Vec<PrinterDescriptor> = Vec::new();
            for info in slice.iter() {
                if info.pPrinterName.is_null() {
                    continue;
                }
                let name = PWSTR(info.pPrinterName.0).to_string().unwrap_or_default();

                let model = if info.pDriverName.is_null() {
                    String::new()
                } else {
                    PWSTR(info.pDriverName.0).to_string().unwrap_or_default()
                };

                let port = if info.pPortName.is_null() {
                    String::new()
                } else {
                    PWSTR(info.pPortName.0).to_string().unwrap_or_default()
                };

                // Virtual spool targets are listed but never reported available
                let offline = (info.Status & PRINTER_STATUS_OFFLINE) != 0
                    || (info.Attributes & PRINTER_ATTRIBUTE_WORK_OFFLINE) != 0;
                let available = !offline && !is_virtual_port(&port);

                let is_default = !default_name.is_empty() && name == default_name;

                result.push(PrinterDescriptor {
                    name,
                    model,
                    is_default,
                    available,
                });
            }

            debug!(count = result.len(), "Enumerated spooler printers");
            Ok(result)
        }
    }

    /// Get the default printer name
    pub fn default_printer() -> PrintResult<Option<String>> {
        use windows::Win32::Graphics::Printing::GetDefaultPrinterW;
        use windows::core::PWSTR;

        unsafe {
            let mut needed: u32 = 0;
            let _ = GetDefaultPrinterW(None, &mut needed);

            if needed == 0 {
                return Ok(None);
            }

            let mut buf: Vec<u16> = vec![0; needed as usize];
            let ok = GetDefaultPrinterW(Some(PWSTR(buf.as_mut_ptr())), &mut needed);

            if !ok.as_bool() {
                return Ok(None);
            }

            let name = PWSTR(buf.as_mut_ptr())
                .to_string()
                .map_err(|e| PrintError::Spooler(format!("UTF-16 decode failed: {}", e)))?;

            Ok(Some(name))
        }
    }

    /// Open and close a handle to verify the queue exists
    pub fn open_check(name: &str) -> PrintResult<()> {
        use windows::Win32::Graphics::Printing::{ClosePrinter, OpenPrinterW, PRINTER_HANDLE};
        use windows::core::PCWSTR;

        unsafe {
            let mut handle: PRINTER_HANDLE = PRINTER_HANDLE::default();
            let name_w = to_wide(name);

            OpenPrinterW(PCWSTR::from_raw(name_w.as_ptr()), &mut handle, None)
                .map_err(|_| PrintError::Spooler(format!("Printer not found: {}", name)))?;

            let _ = ClosePrinter(handle);
            Ok(())
        }
    }

    /// Check if printer is online (includes network port detection for IP printers)
    pub fn check_online(name: &str) -> PrintResult<bool> {
        use std::net::{TcpStream, ToSocketAddrs};
        use std::time::Duration;
        use windows::Win32::Graphics::Printing::{
            ClosePrinter, GetPrinterW, OpenPrinterW, PRINTER_HANDLE, PRINTER_INFO_5W,
            PRINTER_INFO_6, PRINTER_STATUS_OFFLINE,
        };
        use windows::core::{PCWSTR, PWSTR};

        unsafe {
            let mut handle: PRINTER_HANDLE = PRINTER_HANDLE::default();
            let name_w = to_wide(name);

            OpenPrinterW(PCWSTR::from_raw(name_w.as_ptr()), &mut handle, None)
                .map_err(|_| PrintError::Spooler("OpenPrinterW failed".to_string()))?;

            // Get PRINTER_INFO_6 for status
            let mut needed6: u32 = 0;
            let _ = GetPrinterW(handle, 6, None, &mut needed6);

            if needed6 > 0 {
                let mut buf6: Vec<u8> = vec![0; needed6 as usize];
                if GetPrinterW(handle, 6, Some(buf6.as_mut_slice()), &mut needed6).is_ok() {
                    let info6 = *(buf6.as_ptr() as *const PRINTER_INFO_6);
                    if (info6.dwStatus & PRINTER_STATUS_OFFLINE) != 0 {
                        let _ = ClosePrinter(handle);
                        return Ok(false);
                    }
                }
            }

            // Get PRINTER_INFO_5 for port name
            let mut needed5: u32 = 0;
            let _ = GetPrinterW(handle, 5, None, &mut needed5);

            let port = if needed5 > 0 {
                let mut buf5: Vec<u8> = vec![0; needed5 as usize];
                if GetPrinterW(handle, 5, Some(buf5.as_mut_slice()), &mut needed5).is_ok() {
                    let info5 = *(buf5.as_ptr() as *const PRINTER_INFO_5W);
                    if !info5.pPortName.is_null() {
                        PWSTR(info5.pPortName.0).to_string().unwrap_or_default()
                    } else {
                        String::new()
                    }
                } else {
                    String::new()
                }
            } else {
                String::new()
            };

            let _ = ClosePrinter(handle);

            // For IP-based printers (IP_xxx port), try TCP connection
            let lower = port.to_lowercase();
            if lower.starts_with("ip_") {
                let host = lower.trim_start_matches("ip_");
                let host = host.split(',').next().unwrap_or(host);

                let timeout = Duration::from_millis(400);
                if let Ok(mut iter) = format!("{}:9100", host).to_socket_addrs() {
                    if let Some(addr) = iter.next() {
                        return Ok(TcpStream::connect_timeout(&addr, timeout).is_ok());
                    }
                }
                return Ok(false);
            }

            // For non-IP printers, assume online if not marked offline
            Ok(true)
        }
    }

    /// Write raw data through the spooler as a single RAW document
    pub fn write_raw(name: &str, data: &[u8]) -> PrintResult<()> {
        use core::ffi::c_void;
        use windows::Win32::Graphics::Printing::{
            ClosePrinter, DOC_INFO_1W, EndDocPrinter, EndPagePrinter, OpenPrinterW, PRINTER_HANDLE,
            StartDocPrinterW, StartPagePrinter, WritePrinter,
        };
        use windows::core::{PCWSTR, PWSTR};

        unsafe {
            // Check if printer is online first
            if !check_online(name).unwrap_or(true) {
                return Err(PrintError::Offline(name.to_string()));
            }

            let mut handle: PRINTER_HANDLE = PRINTER_HANDLE::default();
            let name_w = to_wide(name);

            OpenPrinterW(PCWSTR::from_raw(name_w.as_ptr()), &mut handle, None)
                .map_err(|_| PrintError::Spooler("OpenPrinterW failed".to_string()))?;

            let doc_name_w = to_wide("Raw Document");
            let datatype_w = to_wide("RAW");
            let doc_info = DOC_INFO_1W {
                pDocName: PWSTR(doc_name_w.as_ptr() as *mut _),
                pOutputFile: PWSTR::null(),
                pDatatype: PWSTR(datatype_w.as_ptr() as *mut _),
            };

            if StartDocPrinterW(handle, 1, &doc_info as *const DOC_INFO_1W) == 0 {
                let _ = ClosePrinter(handle);
                return Err(PrintError::Spooler("StartDocPrinter failed".to_string()));
            }

            if !StartPagePrinter(handle).as_bool() {
                let _ = EndDocPrinter(handle);
                let _ = ClosePrinter(handle);
                return Err(PrintError::Spooler("StartPagePrinter failed".to_string()));
            }

            let mut written: u32 = 0;
            let ok = WritePrinter(
                handle,
                data.as_ptr() as *const c_void,
                data.len() as u32,
                &mut written,
            );

            let _ = EndPagePrinter(handle);
            let _ = EndDocPrinter(handle);
            let _ = ClosePrinter(handle);

            if !ok.as_bool() {
                return Err(PrintError::Spooler("WritePrinter failed".to_string()));
            }

            if written != data.len() as u32 {
                return Err(PrintError::Spooler("Incomplete write".to_string()));
            }

            Ok(())
        }
    }
}

#[cfg(not(windows))]
mod platform {
    use shared::model::PrinterDescriptor;

    use crate::error::{PrintError, PrintResult};

    // No spooler on this platform: listing is empty rather than an error,
    // targeting a queue by name fails.

    pub fn list_printers() -> PrintResult<Vec<PrinterDescriptor>> {
        Ok(Vec::new())
    }

    pub fn default_printer() -> PrintResult<Option<String>> {
        Ok(None)
    }

    pub fn open_check(name: &str) -> PrintResult<()> {
        Err(PrintError::Unsupported(format!(
            "No spooler backend for printer: {}",
            name
        )))
    }

    pub fn check_online(_name: &str) -> PrintResult<bool> {
        Ok(false)
    }

    pub fn write_raw(name: &str, _data: &[u8]) -> PrintResult<()> {
        Err(PrintError::Unsupported(format!(
            "No spooler backend for printer: {}",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_port_detection() {
        assert!(is_virtual_port("FILE:"));
        assert!(is_virtual_port("PORTPROMPT:"));
        assert!(is_virtual_port("nul:"));
        assert!(is_virtual_port("OneNote (Desktop)"));
        assert!(is_virtual_port("WFSPORT:1"));

        assert!(!is_virtual_port("USB001"));
        assert!(!is_virtual_port("IP_192.168.1.50"));
        assert!(!is_virtual_port(""));
    }

    #[test]
    fn test_queue_name_access() {
        let printer = SpoolerPrinter::new("EPSON TM-T20III Receipt");
        assert_eq!(printer.name(), "EPSON TM-T20III Receipt");
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_stub_platform_behavior() {
        // Listing degrades to empty, targeting a queue fails
        assert!(SpoolerPrinter::list().unwrap().is_empty());
        assert!(SpoolerPrinter::default_printer().unwrap().is_none());

        let printer = SpoolerPrinter::new("anything");
        assert!(printer.probe().await.is_err());
        assert!(!printer.is_online().await);

        let err = Printer::print(&printer, &[0x1b, 0x40]).await.unwrap_err();
        assert!(matches!(err, PrintError::Unsupported(_)));
    }
}

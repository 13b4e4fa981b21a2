//! Print a test receipt through a running bridge
//!
//! Lists the available printers, connects to the chosen one and sends a
//! short ESC/POS receipt.
//!
//! Run: cargo run --example print_receipt -- [printer-name]

use bridge_client::BridgeClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let addr = std::env::var("CHANNEL_LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:9110".into());
    let client = BridgeClient::connect(&addr, "print-receipt-example").await?;

    let printers = client.get_list().await?;
    if printers.is_empty() {
        println!("No printers reported by the bridge");
        return Ok(());
    }

    println!("Printers:");
    for printer in &printers {
        println!(
            "  {} ({}){}{}",
            printer.name,
            printer.model,
            if printer.is_default { " [default]" } else { "" },
            if printer.available { "" } else { " [offline]" },
        );
    }

    // Pick the printer from the command line, or the default, or the first
    let target = std::env::args().nth(1).unwrap_or_else(|| {
        printers
            .iter()
            .find(|p| p.is_default)
            .unwrap_or(&printers[0])
            .name
            .clone()
    });

    println!("Connecting to {}...", target);
    if !client.connect_printer(&target).await? {
        println!("Could not connect to {}", target);
        return Ok(());
    }

    // ESC/POS: initialize, print, feed and cut
    let mut job = Vec::new();
    job.extend_from_slice(b"\x1b@");
    job.extend_from_slice(b"TEST RECEIPT\n");
    job.extend_from_slice(b"------------\n");
    job.extend_from_slice(b"1x Coffee      3.50\n");
    job.extend_from_slice(b"\n\n\n");
    job.extend_from_slice(b"\x1dV\x01");

    if client.print_bytes(&job).await? {
        println!("Receipt sent");
    } else {
        println!("Print failed");
    }

    client.close_printer().await?;
    client.close().await?;
    Ok(())
}

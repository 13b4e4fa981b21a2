use bridge_server::{ChannelService, Config, print_banner, setup_environment};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Set up environment (dotenv, logging)
    setup_environment()?;

    print_banner();

    tracing::info!("Printer bridge starting...");

    // 2. Load configuration
    let config = Config::from_env();

    // 3. Start the channel service and its dispatch loop
    let service = ChannelService::new(&config);
    let session = service.create_session();
    service.start_background_tasks(session);

    // 4. Serve the method channel in the background
    let channel_service = service.clone();
    tokio::spawn(async move {
        if let Err(e) = channel_service.start_tcp_server().await {
            tracing::error!("Method channel TCP server failed: {}", e);
        }
    });

    // 5. Run until interrupted
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutting down...");
    service.shutdown();

    Ok(())
}

//! Utility helpers

pub mod logger;

/// Set up the process environment
///
/// Loads `.env` if present and initializes logging from `LOG_LEVEL` and
/// `LOG_DIR`.
pub fn setup_environment() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is not an error
    let _ = dotenv::dotenv();

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    logger::init_logger_with_file(log_level.as_deref(), log_dir.as_deref());

    Ok(())
}

#![cfg(not(tarpaulin_include))]

use clap::Parser;
use quotation_desk::app;
use quotation_desk::config::Config;

/// Main entry point for the web application
///
/// Reads configuration from the command line and environment, sets up logging
/// (`RUST_LOG`, default `info`) and serves the API until the process is stopped.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    log::info!(
        "Starting quotation service (photo timeout {}s, {} concurrent fetches)",
        config.photo_timeout_secs,
        config.photo_concurrency
    );

    app::run(config).await
}

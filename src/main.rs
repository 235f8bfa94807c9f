//! RAX CDN Server - Entry Point
//!
//! Loads configuration, initialises logging and serves until terminated.

use std::process::ExitCode;

use log::{error, info};

use rax_cdn_server::utils::logging::setup_logging;
use rax_cdn_server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    setup_logging(&config.log_level);
    info!(
        "Launching CDN server (env: {}, base URL: {})...",
        config.app_env, config.base_url
    );

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

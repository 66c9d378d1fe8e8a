//! Chat Portal - Entra ID login with an Azure OpenAI chat relay

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use chat_portal::{cli::Cli, config::Config, portal::Portal, setup_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            // Apply CLI overrides
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host = host.clone();
            }
            config
        }
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Setup tracing: RUST_LOG wins, then --log-level, then the debug flag
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| {
            if config.server.debug {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });
    if let Err(e) = setup_tracing(&level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    // Run with graceful shutdown
    let portal = Portal::new(config);
    if let Err(e) = portal.run().await {
        error!("Portal error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

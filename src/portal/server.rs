//! Portal server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::router::{AppState, create_router};
use crate::completion::CompletionClient;
use crate::config::Config;
use crate::identity::IdentityClient;
use crate::session::Sessions;
use crate::{Error, Result};

/// Chat portal server
pub struct Portal {
    /// Configuration
    config: Config,
}

impl Portal {
    /// Create a new portal
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the portal
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let http_client = reqwest::Client::new();
        let sessions = Sessions::new(&self.config.session);
        let identity = Arc::new(IdentityClient::new(
            http_client.clone(),
            self.config.identity.clone(),
        ));
        let completion = Arc::new(CompletionClient::new(
            http_client,
            self.config.completion.clone(),
        ));

        let state = Arc::new(AppState {
            sessions,
            identity,
            completion,
            config: self.config,
        });

        if state.config.session.secret.is_none() {
            warn!("No session secret configured - sessions will not survive a restart");
        }
        if !state.config.identity.is_configured() {
            warn!("Identity provider not configured - /login will return 500");
        }
        if !state.config.completion.is_configured() {
            warn!("Completion service not configured - /api/chat will return 500");
        }

        let app = create_router(Arc::clone(&state));

        let listener = TcpListener::bind(addr).await?;

        info!(
            version = env!("CARGO_PKG_VERSION"),
            host = %state.config.server.host,
            port = state.config.server.port,
            "Chat portal listening"
        );
        info!(redirect_uri = %format!("{}/authorized", state.config.server.base_url()), "OAuth redirect URI");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!("Shutdown complete");
        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}

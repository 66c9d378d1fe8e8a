//! Chat Portal Library
//!
//! A small web application that signs a browser user in against Microsoft
//! Entra ID using the OAuth2 authorization-code flow, keeps the identity in a
//! cookie-keyed server-side session, and relays chat messages from
//! authenticated users to an Azure OpenAI chat-completion deployment.
//!
//! # Routes
//!
//! - `GET /` - chat page, or a silent-login redirect for anonymous visitors
//! - `GET /login`, `GET /authorized`, `GET /logout` - the login dance
//! - `POST /api/chat` - forward a message, return `{answer}`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod completion;
pub mod config;
pub mod error;
pub mod identity;
pub mod portal;
pub mod session;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}

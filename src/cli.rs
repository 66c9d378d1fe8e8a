//! Command-line interface

use std::path::PathBuf;

use clap::Parser;

/// Entra ID login portal with an Azure OpenAI chat relay
#[derive(Parser, Debug)]
#[command(name = "chat-portal")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "CHAT_PORTAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "CHAT_PORTAL_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "CHAT_PORTAL_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error); defaults to the config's
    /// debug flag
    #[arg(long, env = "CHAT_PORTAL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log format (text, json)
    #[arg(long, env = "CHAT_PORTAL_LOG_FORMAT")]
    pub log_format: Option<String>,
}

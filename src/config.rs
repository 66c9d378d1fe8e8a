//! Configuration management

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    /// Environment files to load before serving.
    /// Loaded in order, later files override earlier. Files that don't exist
    /// are silently skipped.
    #[serde(default)]
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// Session configuration
    pub session: SessionConfig,
    /// Identity provider (Entra ID) configuration
    pub identity: IdentityConfig,
    /// Completion service (Azure OpenAI) configuration
    pub completion: CompletionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Externally visible base URL, used for the OAuth redirect URI and the
    /// post-logout redirect. Defaults to `http://{host}:{port}`.
    pub external_url: Option<String>,
    /// Debug mode: selects a `debug` default log filter when `RUST_LOG` and
    /// `--log-level` are not set
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            external_url: None,
            debug: true,
        }
    }
}

impl ServerConfig {
    /// Base URL browsers can reach this server at
    #[must_use]
    pub fn base_url(&self) -> String {
        self.external_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie-signing secret. When unset a process-random key is generated,
    /// invalidating sessions across restarts.
    pub secret: Option<String>,
    /// Name of the session cookie
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: None,
            cookie_name: "portal_session".to_string(),
        }
    }
}

/// Identity provider configuration (Microsoft Entra ID)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Application (client) ID
    pub client_id: Option<String>,
    /// Client secret for the confidential-client token exchange
    pub client_secret: Option<String>,
    /// Directory (tenant) ID
    pub tenant_id: Option<String>,
    /// Permission scope requested at authorization
    pub scope: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            tenant_id: None,
            scope: "User.Read".to_string(),
        }
    }
}

impl IdentityConfig {
    /// Authority URL derived from the tenant ID
    #[must_use]
    pub fn authority(&self) -> Option<String> {
        self.tenant_id
            .as_ref()
            .map(|t| format!("https://login.microsoftonline.com/{t}"))
    }

    /// True when client id, client secret, and tenant are all present
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.tenant_id.is_some()
    }
}

/// Completion service configuration (Azure OpenAI)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Service endpoint, e.g. `https://example.openai.azure.com`
    pub endpoint: Option<String>,
    /// Deployment (model) name
    pub deployment: Option<String>,
    /// API key
    pub api_key: Option<String>,
    /// API version query parameter (azure wire shape only)
    pub api_version: String,
    /// Wire shape: `azure` or `openai`
    pub api_type: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: None,
            api_key: None,
            api_version: "2024-02-01".to_string(),
            api_type: "azure".to_string(),
        }
    }
}

impl CompletionConfig {
    /// True when both endpoint and deployment are present
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.deployment.is_some()
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        // Load from file if provided
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (CHAT_PORTAL_ prefix)
        figment = figment.merge(Env::prefixed("CHAT_PORTAL_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Load env files into the process environment
        config.load_env_files();

        Ok(config)
    }

    /// Load environment files into the process environment.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let path = Path::new(path_str);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {path_str}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {path_str}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {path_str}");
            }
        }
    }
}

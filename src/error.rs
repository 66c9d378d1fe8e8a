//! Error types for Chat Portal

use std::io;

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for Chat Portal
pub type Result<T> = std::result::Result<T, Error>;

/// Chat Portal errors
#[derive(Error, Debug)]
pub enum Error {
    /// Required external configuration is absent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Identity provider reported a login failure
    #[error("Login failure: {0}")]
    IdentityProvider(String),

    /// Protected operation requested without an authenticated session
    #[error("unauthorized")]
    Unauthorized,

    /// Malformed chat input
    #[error("{0}")]
    BadRequest(String),

    /// Downstream completion call failed
    #[error("Completion error: {0}")]
    Completion(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status this error maps to at the handler boundary
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_401() {
        assert_eq!(Error::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn bad_request_maps_to_400() {
        let err = Error::BadRequest("no message".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn config_and_completion_map_to_500() {
        assert_eq!(
            Error::Config("missing tenant".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::Completion("quota exceeded".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::IdentityProvider("access_denied".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn identity_provider_display_includes_description() {
        let err = Error::IdentityProvider("user cancelled".to_string());
        assert_eq!(err.to_string(), "Login failure: user cancelled");
    }
}

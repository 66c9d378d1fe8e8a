//! HTTP router and handlers
//!
//! The auth flow controller is the only part with sequencing logic: entry
//! redirects anonymous visitors into a silent login, the callback either
//! falls back to an interactive prompt (`login_required`), reports the
//! provider error, or exchanges the code and populates the session.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use super::pages;
use crate::completion::CompletionApi;
use crate::config::Config;
use crate::identity::{self, TokenExchanger, TokenOutcome};
use crate::session::{SessionUser, Sessions};

/// Shared application state
pub struct AppState {
    /// Configuration, constructed once at startup
    pub config: Config,
    /// Session store and cookie codec
    pub sessions: Sessions,
    /// Identity provider token exchange
    pub identity: Arc<dyn TokenExchanger>,
    /// Completion service
    pub completion: Arc<dyn CompletionApi>,
}

impl AppState {
    /// Absolute redirect URI registered with the identity provider
    fn redirect_uri(&self) -> String {
        format!("{}/authorized", self.config.server.base_url())
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/login", get(login_handler))
        .route("/authorized", get(authorized_handler))
        .route("/logout", get(logout_handler))
        .route("/api/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .route("/static/chat.js", get(chat_script_handler))
        .layer(CatchPanicLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// OAuth login query parameters
#[derive(Debug, Deserialize)]
pub struct LoginParams {
    /// `auto=1` marks the silent first attempt
    pub auto: Option<String>,
}

/// OAuth callback query parameters
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,

    /// Error code
    pub error: Option<String>,

    /// Error description
    pub error_description: Option<String>,
}

/// Chat request body
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    /// Free-text message to forward
    pub message: Option<String>,
}

/// GET / - chat page, or a silent-login redirect for anonymous visitors
async fn index_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (_, data) = state.sessions.session_from_headers(&headers);

    match data.user {
        None => Redirect::to("/login?auto=1").into_response(),
        Some(user) => Html(pages::index_page(user.claims.display_name())).into_response(),
    }
}

/// GET /login - redirect to the identity provider's authorization endpoint
async fn login_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LoginParams>,
) -> Response {
    if !state.config.identity.is_configured() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Missing identity provider configuration",
        )
            .into_response();
    }

    let silent = params.auto.as_deref() == Some("1");
    match identity::authorization_url(&state.config.identity, &state.redirect_uri(), silent) {
        Ok(url) => {
            debug!(silent, "Redirecting to identity provider");
            Redirect::to(&url).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// GET /authorized - the identity provider's redirect target
async fn authorized_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error {
        // A silent attempt with no provider-side session comes back as
        // login_required; retry interactively so the user gets a prompt.
        if error == "login_required" {
            debug!("Silent login declined, retrying interactively");
            return Redirect::to("/login").into_response();
        }

        let description = params.error_description.unwrap_or(error);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Login failure: {description}"),
        )
            .into_response();
    }

    let Some(code) = params.code else {
        // Neither code nor error: unexpected, possibly a misconfigured
        // redirect URI on the provider side.
        warn!("Callback carried neither code nor error");
        return Redirect::to("/").into_response();
    };

    match state.identity.exchange_code(&code, &state.redirect_uri()).await {
        Ok(TokenOutcome::Tokens {
            claims,
            access_token,
        }) => {
            let (id, mut data) = state.sessions.session_from_headers(&headers);
            info!(sub = %claims.sub, "Login completed");
            data.user = Some(SessionUser {
                claims,
                access_token,
            });
            state.sessions.save(&id, data);

            let cookie = state.sessions.cookie(&id);
            ([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response()
        }
        Ok(TokenOutcome::Failed { error, description }) => {
            warn!(error = %error, "Token exchange rejected");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Login failure: {description}"),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "Token exchange failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Login failure: {e}"),
            )
                .into_response()
        }
    }
}

/// GET /logout - clear the session and sign out at the provider
async fn logout_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (id, _) = state.sessions.session_from_headers(&headers);
    state.sessions.clear(&id);

    let post_logout = format!("{}/", state.config.server.base_url());
    let target = identity::logout_url(&state.config.identity, &post_logout)
        .unwrap_or_else(|_| "/".to_string());

    (
        [(header::SET_COOKIE, state.sessions.removal_cookie())],
        Redirect::to(&target),
    )
        .into_response()
}

/// POST /api/chat - forward a message to the completion service
///
/// The body is taken as raw bytes so an unauthenticated caller gets 401
/// regardless of what they posted, even bytes that are not UTF-8; it is only
/// parsed once the session check passed.
async fn chat_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (_, data) = state.sessions.session_from_headers(&headers);
    if data.user.is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unauthorized"})),
        )
            .into_response();
    }

    let request: ChatRequest = serde_json::from_slice(&body).unwrap_or_default();
    let message = request.message.unwrap_or_default();
    if message.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "no message"}))).into_response();
    }

    if !state.config.completion.is_configured() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "completion service not configured"})),
        )
            .into_response();
    }

    match state.completion.complete(&message).await {
        Ok(answer) => Json(json!({"answer": answer})).into_response(),
        Err(e) => {
            error!(error = %e, "Completion request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /static/chat.js - browser-side chat script
async fn chat_script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        pages::CHAT_SCRIPT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // =====================================================================
    // CallbackParams
    // =====================================================================

    #[test]
    fn callback_params_deserialize_code() {
        let params: CallbackParams = serde_urlencoded::from_str("code=abc123").unwrap();
        assert_eq!(params.code, Some("abc123".to_string()));
        assert!(params.error.is_none());
    }

    #[test]
    fn callback_params_deserialize_error() {
        let params: CallbackParams =
            serde_urlencoded::from_str("error=login_required&error_description=AADSTS50058")
                .unwrap();
        assert_eq!(params.error, Some("login_required".to_string()));
        assert_eq!(params.error_description, Some("AADSTS50058".to_string()));
    }

    #[test]
    fn callback_params_deserialize_empty() {
        let params: CallbackParams = serde_urlencoded::from_str("").unwrap();
        assert!(params.code.is_none());
        assert!(params.error.is_none());
    }

    // =====================================================================
    // ChatRequest
    // =====================================================================

    #[test]
    fn chat_request_parses_message() {
        let request: ChatRequest = serde_json::from_str(r#"{"message": "hello"}"#).unwrap();
        assert_eq!(request.message.as_deref(), Some("hello"));
    }

    #[test]
    fn chat_request_defaults_on_garbage() {
        let request: ChatRequest = serde_json::from_str("not json").unwrap_or_default();
        assert!(request.message.is_none());
    }

    #[test]
    fn login_params_detect_silent_flag() {
        let params: LoginParams = serde_urlencoded::from_str("auto=1").unwrap();
        assert_eq!(params.auto.as_deref(), Some("1"));

        let params: LoginParams = serde_urlencoded::from_str("").unwrap();
        assert!(params.auto.is_none());
    }
}

//! Identity provider client (Microsoft Entra ID)
//!
//! Builds the authorization-request and logout URLs and exchanges an
//! authorization code for tokens at the v2.0 token endpoint.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::config::IdentityConfig;
use crate::{Error, Result};

/// Identity claims extracted from the ID token. Extra claims are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// Issuer
    pub iss: String,
    /// Subject
    pub sub: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Email address
    #[serde(default)]
    pub email: Option<String>,
}

impl UserClaims {
    /// Best available human-readable name for the user
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.sub)
    }
}

/// Outcome of an authorization-code exchange
#[derive(Debug, Clone)]
pub enum TokenOutcome {
    /// Exchange succeeded and the response carried identity claims
    Tokens {
        /// Claims decoded from the ID token
        claims: UserClaims,
        /// Opaque bearer token
        access_token: String,
    },
    /// Provider rejected the exchange
    Failed {
        /// Provider error code
        error: String,
        /// Human-readable description
        description: String,
    },
}

/// Code-for-token exchange seam, stubbed in tests
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Exchange an authorization code for a token set
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenOutcome>;
}

/// Build the authorization-request URL.
///
/// `prompt=none` is requested for the silent first attempt, so an existing
/// provider-side session signs the user in without a prompt and a missing one
/// comes back as `error=login_required`.
pub fn authorization_url(
    config: &IdentityConfig,
    redirect_uri: &str,
    silent: bool,
) -> Result<String> {
    let authority = configured_authority(config)?;
    let client_id = config
        .client_id
        .as_ref()
        .ok_or_else(|| Error::Config("identity client_id not set".to_string()))?;

    let mut url = Url::parse(&format!("{authority}/oauth2/v2.0/authorize"))
        .map_err(|e| Error::Config(format!("Invalid authority URL: {e}")))?;

    {
        let mut params = url.query_pairs_mut();
        params.append_pair("client_id", client_id);
        params.append_pair("response_type", "code");
        params.append_pair("redirect_uri", redirect_uri);
        params.append_pair("response_mode", "query");
        params.append_pair("scope", &config.scope);
        if silent {
            params.append_pair("prompt", "none");
        }
    }

    Ok(url.to_string())
}

/// Build the provider logout URL, which clears the provider-side session and
/// then redirects the browser back to us.
pub fn logout_url(config: &IdentityConfig, post_logout_redirect: &str) -> Result<String> {
    let authority = configured_authority(config)?;

    let mut url = Url::parse(&format!("{authority}/oauth2/v2.0/logout"))
        .map_err(|e| Error::Config(format!("Invalid authority URL: {e}")))?;
    url.query_pairs_mut()
        .append_pair("post_logout_redirect_uri", post_logout_redirect);

    Ok(url.to_string())
}

fn configured_authority(config: &IdentityConfig) -> Result<String> {
    config
        .authority()
        .ok_or_else(|| Error::Config("identity tenant_id not set".to_string()))
}

/// Identity client performing the confidential-client token exchange
pub struct IdentityClient {
    http_client: Client,
    config: IdentityConfig,
}

/// Token endpoint response. Success and error bodies share this shape; the
/// provider reports rejections as JSON with `error`/`error_description`.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    id_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl IdentityClient {
    /// Create a new identity client
    #[must_use]
    pub fn new(http_client: Client, config: IdentityConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }
}

#[async_trait]
impl TokenExchanger for IdentityClient {
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenOutcome> {
        let authority = configured_authority(&self.config)?;
        let client_id = self
            .config
            .client_id
            .as_ref()
            .ok_or_else(|| Error::Config("identity client_id not set".to_string()))?;
        let client_secret = self
            .config
            .client_secret
            .as_ref()
            .ok_or_else(|| Error::Config("identity client_secret not set".to_string()))?;

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("scope", &self.config.scope),
        ];

        let response = self
            .http_client
            .post(format!("{authority}/oauth2/v2.0/token"))
            .form(&params)
            .send()
            .await?;

        // Rejections arrive as a 4xx with the same JSON shape, so parse the
        // body rather than bailing on the status.
        let token_response: TokenResponse = response.json().await?;
        let outcome = outcome_from_response(token_response)?;

        match &outcome {
            TokenOutcome::Tokens { claims, .. } => {
                info!(sub = %claims.sub, "Authorization code exchanged");
            }
            TokenOutcome::Failed { error, .. } => {
                debug!(error = %error, "Token exchange rejected");
            }
        }

        Ok(outcome)
    }
}

/// Interpret a token endpoint response
fn outcome_from_response(response: TokenResponse) -> Result<TokenOutcome> {
    if let (Some(id_token), Some(access_token)) = (&response.id_token, &response.access_token) {
        let claims = decode_claims(id_token)?;
        return Ok(TokenOutcome::Tokens {
            claims,
            access_token: access_token.clone(),
        });
    }

    let error = response
        .error
        .unwrap_or_else(|| "invalid_response".to_string());
    let description = response
        .error_description
        .unwrap_or_else(|| "token response carried no identity claims".to_string());
    Ok(TokenOutcome::Failed { error, description })
}

/// Decode the claims from an ID token's payload segment.
///
/// The signature is not re-verified: the token arrives over TLS directly from
/// the issuer in a confidential-client exchange.
fn decode_claims(id_token: &str) -> Result<UserClaims> {
    let mut segments = id_token.split('.');
    let payload = segments
        .nth(1)
        .ok_or_else(|| Error::IdentityProvider("malformed ID token".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| Error::IdentityProvider(format!("undecodable ID token payload: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::IdentityProvider(format!("unexpected ID token claims: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn identity_config() -> IdentityConfig {
        IdentityConfig {
            client_id: Some("client-123".to_string()),
            client_secret: Some("secret".to_string()),
            tenant_id: Some("tenant-abc".to_string()),
            scope: "User.Read".to_string(),
        }
    }

    fn fake_id_token(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
        format!("{header}.{payload}.fake-signature")
    }

    // =========================================================================
    // URL construction
    // =========================================================================

    #[test]
    fn authorization_url_carries_code_flow_params() {
        let url =
            authorization_url(&identity_config(), "http://127.0.0.1:5000/authorized", false)
                .unwrap();
        let parsed = Url::parse(&url).unwrap();

        assert!(url.starts_with(
            "https://login.microsoftonline.com/tenant-abc/oauth2/v2.0/authorize?"
        ));
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(pairs.contains(&("client_id".to_string(), "client-123".to_string())));
        assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "http://127.0.0.1:5000/authorized".to_string()
        )));
        assert!(pairs.contains(&("scope".to_string(), "User.Read".to_string())));
        assert!(!pairs.iter().any(|(k, _)| k == "prompt"));
    }

    #[test]
    fn silent_authorization_requests_prompt_none() {
        let url =
            authorization_url(&identity_config(), "http://127.0.0.1:5000/authorized", true)
                .unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert!(
            parsed
                .query_pairs()
                .any(|(k, v)| k == "prompt" && v == "none")
        );
    }

    #[test]
    fn authorization_url_without_tenant_is_config_error() {
        let mut config = identity_config();
        config.tenant_id = None;
        let err = authorization_url(&config, "http://x/authorized", false).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn logout_url_carries_post_logout_redirect() {
        let url = logout_url(&identity_config(), "http://127.0.0.1:5000/").unwrap();
        assert!(
            url.starts_with("https://login.microsoftonline.com/tenant-abc/oauth2/v2.0/logout?")
        );
        assert!(url.contains("post_logout_redirect_uri="));
    }

    // =========================================================================
    // Claims decoding
    // =========================================================================

    #[test]
    fn decode_claims_extracts_known_fields() {
        let token = fake_id_token(&serde_json::json!({
            "iss": "https://login.microsoftonline.com/tenant-abc/v2.0",
            "sub": "subject-1",
            "name": "Test User",
            "email": "test@example.com",
            "aud": "client-123",
            "exp": 1_999_999_999u64
        }));

        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.sub, "subject-1");
        assert_eq!(claims.name.as_deref(), Some("Test User"));
        assert_eq!(claims.email.as_deref(), Some("test@example.com"));
        assert_eq!(claims.display_name(), "Test User");
    }

    #[test]
    fn decode_claims_tolerates_missing_optional_fields() {
        let token = fake_id_token(&serde_json::json!({
            "iss": "https://login.microsoftonline.com/tenant-abc/v2.0",
            "sub": "subject-2"
        }));

        let claims = decode_claims(&token).unwrap();
        assert!(claims.name.is_none());
        assert!(claims.email.is_none());
        assert_eq!(claims.display_name(), "subject-2");
    }

    #[test]
    fn decode_claims_rejects_garbage() {
        assert!(decode_claims("not-a-jwt").is_err());
        assert!(decode_claims("a.!!!.c").is_err());
    }

    // =========================================================================
    // Token response interpretation
    // =========================================================================

    #[test]
    fn response_with_tokens_yields_claims() {
        let token = fake_id_token(&serde_json::json!({
            "iss": "https://login.microsoftonline.com/tenant-abc/v2.0",
            "sub": "subject-3"
        }));
        let response = TokenResponse {
            access_token: Some("bearer-token".to_string()),
            id_token: Some(token),
            error: None,
            error_description: None,
        };

        match outcome_from_response(response).unwrap() {
            TokenOutcome::Tokens {
                claims,
                access_token,
            } => {
                assert_eq!(claims.sub, "subject-3");
                assert_eq!(access_token, "bearer-token");
            }
            TokenOutcome::Failed { .. } => panic!("expected tokens"),
        }
    }

    #[test]
    fn error_response_yields_failure_with_description() {
        let response = TokenResponse {
            access_token: None,
            id_token: None,
            error: Some("invalid_grant".to_string()),
            error_description: Some("AADSTS70008: expired code".to_string()),
        };

        match outcome_from_response(response).unwrap() {
            TokenOutcome::Failed { error, description } => {
                assert_eq!(error, "invalid_grant");
                assert!(description.contains("AADSTS70008"));
            }
            TokenOutcome::Tokens { .. } => panic!("expected failure"),
        }
    }

    #[test]
    fn response_without_id_token_is_a_failure() {
        let response = TokenResponse {
            access_token: Some("bearer-token".to_string()),
            id_token: None,
            error: None,
            error_description: None,
        };

        assert!(matches!(
            outcome_from_response(response).unwrap(),
            TokenOutcome::Failed { .. }
        ));
    }
}

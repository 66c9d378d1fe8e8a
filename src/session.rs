//! Server-side sessions keyed by a signed browser cookie
//!
//! The cookie only carries a random session id plus an HMAC-SHA256 signature;
//! the identity claims and access token never leave the process. A missing,
//! malformed, or tampered cookie yields a fresh anonymous session.

use std::sync::Arc;

use axum::http::HeaderMap;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use dashmap::DashMap;
use hmac::{Hmac, KeyInit, Mac};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::SessionConfig;
use crate::identity::UserClaims;

type HmacSha256 = Hmac<Sha256>;

/// Identity stored for an authenticated session.
///
/// Claims and access token travel together: a session is either anonymous or
/// holds both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    /// Identity claims from the ID token
    pub claims: UserClaims,
    /// Opaque bearer token from the code exchange
    pub access_token: String,
}

/// Per-browser-session state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionData {
    /// Authenticated user, if login completed
    pub user: Option<SessionUser>,
}

/// Pluggable session storage, keyed by session id
pub trait SessionStore: Send + Sync {
    /// Load the session for an id, if one exists
    fn load(&self, id: &str) -> Option<SessionData>;
    /// Save (create or replace) the session for an id
    fn save(&self, id: &str, data: SessionData);
    /// Remove the session for an id; a no-op when none exists
    fn clear(&self, id: &str);
}

/// In-process session store
#[derive(Default)]
pub struct MemoryStore {
    sessions: DashMap<String, SessionData>,
}

impl SessionStore for MemoryStore {
    fn load(&self, id: &str) -> Option<SessionData> {
        self.sessions.get(id).map(|entry| entry.clone())
    }

    fn save(&self, id: &str, data: SessionData) {
        self.sessions.insert(id.to_string(), data);
    }

    fn clear(&self, id: &str) {
        self.sessions.remove(id);
    }
}

/// Session facade: store plus the signed-cookie codec
pub struct Sessions {
    store: Arc<dyn SessionStore>,
    secret: Vec<u8>,
    cookie_name: String,
}

impl Sessions {
    /// Create a session facade backed by an in-memory store.
    ///
    /// When no secret is configured a process-random key is generated, which
    /// invalidates outstanding cookies across restarts.
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::default()))
    }

    /// Create a session facade with a custom store
    #[must_use]
    pub fn with_store(config: &SessionConfig, store: Arc<dyn SessionStore>) -> Self {
        let secret = config.secret.as_ref().map_or_else(
            || {
                let key: [u8; 32] = rand::rng().random();
                key.to_vec()
            },
            |s| s.as_bytes().to_vec(),
        );
        Self {
            store,
            secret,
            cookie_name: config.cookie_name.clone(),
        }
    }

    /// Resolve the session for a request: the id from a valid cookie (minting
    /// a fresh id otherwise) and the stored data for it, anonymous by default.
    #[must_use]
    pub fn session_from_headers(&self, headers: &HeaderMap) -> (String, SessionData) {
        if let Some(id) = self.id_from_headers(headers) {
            let data = self.store.load(&id).unwrap_or_default();
            return (id, data);
        }
        (generate_session_id(), SessionData::default())
    }

    /// Save session data under an id
    pub fn save(&self, id: &str, data: SessionData) {
        self.store.save(id, data);
    }

    /// Clear the session for an id
    pub fn clear(&self, id: &str) {
        self.store.clear(id);
    }

    /// `Set-Cookie` value that binds a browser to a session id
    #[must_use]
    pub fn cookie(&self, id: &str) -> String {
        format!(
            "{}={}.{}; Path=/; HttpOnly; SameSite=Lax",
            self.cookie_name,
            id,
            self.sign(id)
        )
    }

    /// `Set-Cookie` value that expires the session cookie
    #[must_use]
    pub fn removal_cookie(&self) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
            self.cookie_name
        )
    }

    /// Extract and verify the session id from the request's cookies
    fn id_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        let prefix = format!("{}=", self.cookie_name);
        for value in headers.get_all(axum::http::header::COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            for pair in raw.split(';') {
                if let Some(cookie_value) = pair.trim().strip_prefix(&prefix) {
                    if let Some(id) = self.verify(cookie_value) {
                        return Some(id);
                    }
                }
            }
        }
        None
    }

    /// Verify a cookie value of the form `{id}.{signature}`
    fn verify(&self, cookie_value: &str) -> Option<String> {
        let (id, signature) = cookie_value.split_once('.')?;
        let provided = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let expected = self.mac_bytes(id);
        if provided.ct_eq(&expected).into() {
            Some(id.to_string())
        } else {
            None
        }
    }

    fn sign(&self, id: &str) -> String {
        URL_SAFE_NO_PAD.encode(self.mac_bytes(id))
    }

    fn mac_bytes(&self, id: &str) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(id.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// Generate a random session id
fn generate_session_id() -> String {
    let id_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(id_bytes)
}

// Bearer session lifecycle
//
// Login, silent refresh, and expiry pre-emption for the MCS token pair.
// The session is an immutable value that is swapped wholesale on every
// change, so concurrent readers never observe a half-updated token pair.

use std::sync::Arc;

use arc_swap::ArcSwap;
use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::client::endpoint_url;
use crate::error::Error;

/// Tokens are renewed once they are this close to expiry.
pub const EXPIRY_SKEW_SECS: i64 = 30;

const LOGIN_PATH: &str = "auth/login";
const REFRESH_PATH: &str = "auth/token/refresh";

/// Username/password pair used for full logins.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

// ── Session ──────────────────────────────────────────────────────

/// Snapshot of the current token pair.
///
/// An empty session (no access token) forces a login on the next request.
#[derive(Debug, Clone, Default)]
pub struct Session {
    access_token: Option<SecretString>,
    refresh_token: Option<SecretString>,
    expires_at: i64,
}

impl Session {
    fn from_tokens(access: String, refresh: String) -> Self {
        let expires_at = decode_expiry(&access);
        Self {
            access_token: Some(SecretString::from(access)),
            refresh_token: Some(SecretString::from(refresh)),
            expires_at,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_ref().map(ExposeSecret::expose_secret)
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(ExposeSecret::expose_secret)
    }

    /// Access-token expiry in epoch seconds (0 when unknown).
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none()
    }

    /// A token is usable only while more than [`EXPIRY_SKEW_SECS`] remain.
    pub fn is_fresh_at(&self, now: i64) -> bool {
        self.access_token.is_some() && self.expires_at - now > EXPIRY_SKEW_SECS
    }
}

/// Read the `exp` claim from a JWT without verifying its signature.
///
/// This only exists to pre-empt needless refreshes; it is not a security
/// boundary. Anything undecodable yields 0, which forces a refresh.
pub(crate) fn decode_expiry(token: &str) -> i64 {
    #[derive(Deserialize)]
    struct Claims {
        exp: Option<serde_json::Value>,
    }

    let Some(payload) = token.split('.').nth(1) else {
        return 0;
    };
    let payload = payload.trim_end_matches('=');
    let Ok(bytes) = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
    else {
        return 0;
    };

    serde_json::from_slice::<Claims>(&bytes)
        .ok()
        .and_then(|claims| claims.exp)
        .and_then(|exp| exp.as_i64().or_else(|| exp.as_str()?.parse().ok()))
        .unwrap_or(0)
}

fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

// ── Wire shapes ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct TokenEnvelope {
    data: Option<TokenPair>,
}

#[derive(Deserialize)]
struct TokenPair {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

// ── SessionManager ───────────────────────────────────────────────

/// Owns the bearer session for one device.
///
/// Renewal is serialized behind an async mutex: concurrent callers that all
/// find the token stale wait for one renewal instead of each starting their
/// own.
pub struct SessionManager {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    session: ArcSwap<Session>,
    renew_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(http: reqwest::Client, base_url: Url, credentials: Credentials) -> Self {
        Self {
            http,
            base_url,
            credentials,
            session: ArcSwap::from_pointee(Session::default()),
            renew_lock: Mutex::new(()),
        }
    }

    /// The current session (cheap `Arc` clone).
    pub fn current(&self) -> Arc<Session> {
        self.session.load_full()
    }

    /// Drop both tokens. The next request performs a full login.
    pub fn clear(&self) {
        self.session.store(Arc::new(Session::default()));
    }

    /// Guarantee a fresh-enough access token, refreshing or logging in as
    /// needed. Fails only when a full login fails.
    pub async fn ensure_valid(&self) -> Result<Arc<Session>, Error> {
        let session = self.current();
        if session.is_fresh_at(now_epoch()) {
            return Ok(session);
        }

        let _guard = self.renew_lock.lock().await;
        // Another caller may have renewed while we waited for the lock.
        let session = self.current();
        if session.is_fresh_at(now_epoch()) {
            return Ok(session);
        }
        self.renew_locked().await
    }

    /// Authenticate with username/password and replace the session.
    pub async fn login(&self) -> Result<Arc<Session>, Error> {
        let _guard = self.renew_lock.lock().await;
        self.login_locked().await
    }

    /// Refresh the token pair, falling back to a full login when there is
    /// no refresh token or the refresh is rejected for any reason.
    pub async fn refresh_if_possible(&self) -> Result<Arc<Session>, Error> {
        let _guard = self.renew_lock.lock().await;
        self.renew_locked().await
    }

    /// Renew after the device rejected `rejected` with a 401, unless another
    /// caller already replaced it in the meantime.
    pub(crate) async fn renew_rejected(
        &self,
        rejected: &Arc<Session>,
    ) -> Result<Arc<Session>, Error> {
        let _guard = self.renew_lock.lock().await;
        let session = self.current();
        if !Arc::ptr_eq(&session, rejected) && !session.is_empty() {
            debug!("session already renewed by a concurrent request");
            return Ok(session);
        }
        self.renew_locked().await
    }

    // ── Locked internals (caller holds `renew_lock`) ──────────────

    async fn renew_locked(&self) -> Result<Arc<Session>, Error> {
        let current = self.current();
        let Some(refresh_token) = current.refresh_token() else {
            debug!("no refresh token; logging in");
            return self.login_locked().await;
        };

        let body = json!({ "refresh_token": refresh_token });
        match self.request_tokens(REFRESH_PATH, &body).await {
            Ok(session) => {
                debug!(expires_at = session.expires_at, "token refresh successful");
                Ok(self.install(session))
            }
            Err(e) => {
                let err = Error::Refresh {
                    message: e.to_string(),
                };
                debug!(error = %err, "falling back to full login");
                self.login_locked().await
            }
        }
    }

    async fn login_locked(&self) -> Result<Arc<Session>, Error> {
        debug!(username = %self.credentials.username, "logging in");

        let body = json!({
            "username": self.credentials.username,
            "password": self.credentials.password.expose_secret(),
        });

        match self.request_tokens(LOGIN_PATH, &body).await {
            Ok(session) => {
                debug!(expires_at = session.expires_at, "login successful");
                Ok(self.install(session))
            }
            Err(e) => {
                warn!(error = %e, "login failed");
                self.clear();
                Err(if matches!(e, Error::Login { .. }) {
                    e
                } else {
                    Error::Login {
                        message: e.to_string(),
                    }
                })
            }
        }
    }

    fn install(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.session.store(Arc::clone(&session));
        session
    }

    /// POST to a token endpoint and parse the `{data: {access_token,
    /// refresh_token}}` reply.
    async fn request_tokens(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<Session, Error> {
        let url = endpoint_url(&self.base_url, path)?;
        debug!("POST {}", url);

        let resp = self.http.post(url).json(body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(Error::Http {
                method: "POST".into(),
                path: path.into(),
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().into(),
                body: text,
            });
        }

        let envelope: TokenEnvelope =
            serde_json::from_str(&text).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: text.clone(),
            })?;

        match envelope.data {
            Some(TokenPair {
                access_token: Some(access),
                refresh_token: Some(refresh),
            }) => Ok(Session::from_tokens(access, refresh)),
            _ => Err(Error::Login {
                message: "response did not include an access and refresh token".into(),
            }),
        }
    }
}

// MCS HTTP request layer
//
// Wraps `reqwest::Client` with bearer-token attachment, a single
// refresh-and-retry on 401, explicit redirect rejection, and typed status
// errors. Resource endpoints (outputs, layouts, channels) are implemented
// as inherent methods in separate files to keep this module focused on
// transport mechanics.

use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::session::{Credentials, Session, SessionManager};
use crate::transport::TransportConfig;

/// Path prefix of the device REST API.
pub const API_PREFIX: &str = "/api/5.0";

/// Build the API base URL: `https://{host}[:{port}]/api/5.0`.
///
/// The port segment is omitted for 443.
pub fn base_url(host: &str, port: u16) -> Result<Url, Error> {
    let authority = if port == 443 {
        host.to_owned()
    } else {
        format!("{host}:{port}")
    };
    Ok(Url::parse(&format!("https://{authority}{API_PREFIX}"))?)
}

/// Append a relative API path to the base URL.
///
/// `Url::join` would replace the last base segment (`5.0`), so the path is
/// concatenated instead.
pub(crate) fn endpoint_url(base: &Url, path: &str) -> Result<Url, Error> {
    let base = base.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
}

/// Authenticated JSON client for one MCS device.
///
/// All methods return parsed JSON; status handling happens here so callers
/// only ever see typed [`Error`]s.
pub struct McsClient {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<SessionManager>,
}

impl McsClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the API root (see [`base_url`]).
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, credentials))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// The client should have redirects disabled (as built by
    /// [`TransportConfig::build_client`]), otherwise a 3xx is followed
    /// before it can be reported.
    pub fn with_client(http: reqwest::Client, base_url: Url, credentials: Credentials) -> Self {
        let session = Arc::new(SessionManager::new(
            http.clone(),
            base_url.clone(),
            credentials,
        ));
        Self {
            http,
            base_url,
            session,
        }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The session manager that owns this client's tokens.
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send an authenticated JSON request and return the parsed body.
    ///
    /// - 3xx fails with [`Error::Redirect`] (never followed)
    /// - 401 triggers exactly one refresh-and-retry
    /// - any other non-2xx fails with [`Error::Http`]
    ///
    /// An empty 2xx body parses as `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        let url = endpoint_url(&self.base_url, path)?;
        let session = self.session.ensure_valid().await?;

        debug!("{} {}", method, url);
        let mut resp = self.send(&method, &url, body, &session).await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            debug!(%method, path, "401 received; refreshing token and retrying once");
            let renewed = self.session.renew_rejected(&session).await?;
            resp = self.send(&method, &url, body, &renewed).await?;
        }

        Self::parse_response(&method, path, resp).await
    }

    /// GET a path.
    pub async fn get(&self, path: &str) -> Result<Value, Error> {
        self.request(Method::GET, path, None).await
    }

    /// PUT a full-object replacement to a path.
    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, Error> {
        self.request(Method::PUT, path, Some(body)).await
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
        session: &Session,
    ) -> Result<reqwest::Response, Error> {
        let token = session.access_token().ok_or_else(|| Error::Login {
            message: "session holds no access token".into(),
        })?;

        let mut builder = self
            .http
            .request(method.clone(), url.clone())
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }

    async fn parse_response(
        method: &Method,
        path: &str,
        resp: reqwest::Response,
    ) -> Result<Value, Error> {
        let status = resp.status();

        if status.is_redirection() {
            let location = resp
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_owned();
            return Err(Error::Redirect {
                status: status.as_u16(),
                location,
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                method: method.to_string(),
                path: path.to_owned(),
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_owned(),
                body,
            });
        }

        let body = resp.text().await?;
        trace!(bytes = body.len(), "response received");

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| {
            let preview = body.chars().take(200).collect::<String>();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }
}

use thiserror::Error;

/// Top-level error type for the `mcs-api` crate.
///
/// Covers every failure mode of the device API: authentication, transport,
/// HTTP status handling, and payload decoding. `mcs-core` maps these into
/// user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Credentials rejected, or the login response carried no token pair.
    #[error("Login failed: {message}")]
    Login { message: String },

    /// Token refresh failed. The session manager recovers from this by
    /// falling back to a full login, so it never leaves the request layer.
    #[error("Token refresh failed: {message}")]
    Refresh { message: String },

    // ── HTTP ────────────────────────────────────────────────────────
    /// The device answered with a 3xx. Redirects are never followed because
    /// the bearer token would not carry across origins.
    #[error(
        "Redirected (HTTP {status}) to '{location}' -- point the configuration at the correct scheme/port"
    )]
    Redirect { status: u16, location: String },

    /// Non-2xx response after at most one refresh-and-retry.
    #[error("{method} {path} failed: HTTP {status} {status_text}")]
    Http {
        method: String,
        path: String,
        status: u16,
        status_text: String,
        body: String,
    },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } | Self::Redirect { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

// ── Core error types ──
//
// User-facing errors from mcs-core. The `From<mcs_api::Error>` impl
// translates transport-layer failures into domain-appropriate variants;
// token refresh failures never reach this layer because the session
// manager recovers from them with a full login.

use std::time::Duration;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    BadConfig { message: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Login failed: {message}")]
    LoginFailed { message: String },

    #[error("Cannot connect to device at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Device redirected (HTTP {status}) to '{location}'")]
    Redirect { status: u16, location: String },

    #[error("Operation timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Controller disconnected")]
    Disconnected,

    // ── Request errors ───────────────────────────────────────────────
    #[error("HTTP {status} {status_text}: {body}")]
    Http {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("Entity not found: {entity_type} with id {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── Background work ──────────────────────────────────────────────
    #[error("Polling stopped: {message}")]
    PollingFailed { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// HTTP status, when the device answered with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } | Self::Redirect { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Narrow a 404 to a `NotFound` for a known entity.
    pub(crate) fn or_not_found(self, entity_type: &str, identifier: &str) -> Self {
        match self {
            Self::Http { status: 404, .. } | Self::NotFound { .. } => Self::NotFound {
                entity_type: entity_type.to_owned(),
                identifier: identifier.to_owned(),
            },
            other => other,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<mcs_api::Error> for CoreError {
    fn from(err: mcs_api::Error) -> Self {
        match err {
            mcs_api::Error::Login { message } | mcs_api::Error::Refresh { message } => {
                CoreError::LoginFailed { message }
            }
            mcs_api::Error::Redirect { status, location } => {
                CoreError::Redirect { status, location }
            }
            mcs_api::Error::Http {
                status,
                status_text,
                body,
                ..
            } => CoreError::Http {
                status,
                status_text,
                body,
            },
            mcs_api::Error::Transport(ref e) => {
                let url = e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string);
                let reason = if e.is_timeout() {
                    "request timed out".into()
                } else {
                    e.to_string()
                };
                CoreError::ConnectionFailed { url, reason }
            }
            mcs_api::Error::InvalidUrl(e) => CoreError::BadConfig {
                message: format!("Invalid URL: {e}"),
            },
            mcs_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            mcs_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_404_narrows_to_not_found() {
        let err = CoreError::from(mcs_api::Error::Http {
            method: "GET".into(),
            path: "outputs/config/out-9".into(),
            status: 404,
            status_text: "Not Found".into(),
            body: String::new(),
        })
        .or_not_found("output", "out-9");

        assert!(matches!(
            err,
            CoreError::NotFound { ref entity_type, ref identifier }
                if entity_type == "output" && identifier == "out-9"
        ));
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn other_statuses_pass_through() {
        let err = CoreError::from(mcs_api::Error::Http {
            method: "PUT".into(),
            path: "layouts/config/lay-1".into(),
            status: 500,
            status_text: "Internal Server Error".into(),
            body: "boom".into(),
        })
        .or_not_found("layout", "lay-1");

        assert!(matches!(err, CoreError::Http { status: 500, .. }));
    }

    #[test]
    fn login_errors_map_to_login_failed() {
        let err = CoreError::from(mcs_api::Error::Login {
            message: "bad credentials".into(),
        });
        assert_eq!(err.to_string(), "Login failed: bad credentials");
    }
}

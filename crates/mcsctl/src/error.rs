//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use mcs_config::ConfigError;
use mcs_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to device at {url}")]
    #[diagnostic(
        code(mcs::connection_failed),
        help(
            "Check that the device is powered on and reachable.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Device redirected the request (HTTP {status}) to '{location}'")]
    #[diagnostic(
        code(mcs::redirect),
        help(
            "The configured port or scheme is wrong for this device and redirects\n\
             are not followed. Check --port and the profile's ip and port."
        )
    )]
    Redirect { status: u16, location: String },

    #[error("Device connection was closed")]
    #[diagnostic(code(mcs::disconnected))]
    Disconnected,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Login failed: {message}")]
    #[diagnostic(
        code(mcs::auth_failed),
        help(
            "Verify the username and password for this device.\n\
             Run: mcsctl config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(mcs::no_credentials),
        help(
            "Store a password with: mcsctl config set-password {profile}\n\
             Or set the MCS_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(mcs::not_found),
        help("Run: mcsctl {list_command} to see what the device has")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("'{identifier}' matches more than one {resource_type}: {candidates}")]
    #[diagnostic(code(mcs::ambiguous), help("Use the UUID instead of the label."))]
    Ambiguous {
        resource_type: String,
        identifier: String,
        candidates: String,
    },

    // ── Device API ───────────────────────────────────────────────────
    #[error("Device returned HTTP {status}: {message}")]
    #[diagnostic(code(mcs::api_error))]
    ApiError { status: u16, message: String },

    #[error("Internal error: {0}")]
    #[diagnostic(code(mcs::internal))]
    Internal(String),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(mcs::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(mcs::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: mcsctl --host <IP> config set-profile <NAME>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No device configured")]
    #[diagnostic(
        code(mcs::no_config),
        help(
            "Pass --host/--username/--password, or create a profile with:\n\
             mcsctl --host <IP> --username <USER> config set-profile default\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Device configuration is incomplete: {message}")]
    #[diagnostic(code(mcs::bad_config))]
    BadConfig { message: String },

    #[error(transparent)]
    #[diagnostic(code(mcs::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Operation timed out after {}s", after.as_secs())]
    #[diagnostic(
        code(mcs::timeout),
        help("Increase the timeout with --timeout or check the device.")
    )]
    Timeout { after: Duration },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(mcs::json), help("Check the JSON body and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Redirect { .. } | Self::Disconnected => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Ambiguous { .. } | Self::BadConfig { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::BadConfig { message } => CliError::BadConfig { message },

            CoreError::LoginFailed { message } => CliError::AuthFailed { message },

            CoreError::ConnectionFailed { url, reason } => {
                CliError::ConnectionFailed { url, reason }
            }

            CoreError::Redirect { status, location } => CliError::Redirect { status, location },

            CoreError::Timeout { after } => CliError::Timeout { after },

            CoreError::Disconnected => CliError::Disconnected,

            CoreError::Http {
                status,
                status_text,
                body,
            } => CliError::ApiError {
                status,
                message: if body.is_empty() { status_text } else { body },
            },

            CoreError::NotFound {
                entity_type,
                identifier,
            } => CliError::NotFound {
                list_command: list_command_for(&entity_type),
                resource_type: entity_type,
                identifier,
            },

            CoreError::PollingFailed { message } => CliError::ConnectionFailed {
                url: "(polling)".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

fn list_command_for(entity_type: &str) -> String {
    match entity_type {
        "output" => "outputs list".into(),
        "layout" | "tile" => "layouts get <LAYOUT>".into(),
        "channel" => "channels list".into(),
        other => format!("{other}s list"),
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            other => CliError::Config(Box::new(other)),
        }
    }
}

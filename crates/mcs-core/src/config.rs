// ── Runtime connection configuration ──
//
// These types describe *how* to connect to an MCS device and how to pace
// commands against it. They carry credential data and tuning, but never
// touch disk. The CLI (or any other host) constructs a `ControllerConfig`
// and hands it in.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::CoreError;
use crate::scheduler::ScheduleOptions;

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_MIN_COMMAND_GAP: Duration = Duration::from_millis(800);
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(200);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification. MCS devices ship self-signed certificates.
    #[default]
    DangerAcceptInvalid,
}

/// Background state polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    pub enabled: bool,
    pub interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Command pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// When disabled the minimum gap collapses to zero. Commands still run
    /// one at a time, in order.
    pub enabled: bool,
    pub min_gap: Duration,
    /// Post-write pause modelling device-side apply latency.
    pub settle: Duration,
    /// Upper bound for a single queued command, request round trips included.
    pub task_timeout: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_gap: DEFAULT_MIN_COMMAND_GAP,
            settle: DEFAULT_SETTLE,
            task_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl QueueConfig {
    /// The gap actually enforced between commands.
    pub fn effective_min_gap(&self) -> Duration {
        if self.enabled {
            self.min_gap
        } else {
            Duration::ZERO
        }
    }

    /// Scheduler options for a command with the given diagnostic tag.
    pub fn schedule_options(&self, tag: impl Into<String>) -> ScheduleOptions {
        let options = ScheduleOptions::new(tag)
            .min_gap(self.effective_min_gap())
            .settle(self.settle);
        match self.task_timeout {
            Some(limit) => options.timeout(limit),
            None => options,
        }
    }
}

/// Configuration for connecting to a single MCS device.
///
/// Built by the host, passed to `Controller` -- core never reads config files.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Device IP address or host name.
    pub host: String,
    /// HTTPS port (443 is omitted from the URL).
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    pub polling: PollingConfig,
    pub queue: QueueConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: String::new(),
            password: SecretString::from(String::new()),
            tls: TlsVerification::default(),
            timeout: DEFAULT_TIMEOUT,
            polling: PollingConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Check that every field required to reach the device is present.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut missing = Vec::new();
        if self.host.trim().is_empty() {
            missing.push("ip");
        }
        if self.port == 0 {
            missing.push("port");
        }
        if self.username.trim().is_empty() {
            missing.push("username");
        }
        if self.password.expose_secret().is_empty() {
            missing.push("password");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::BadConfig {
                message: format!("missing configuration: {}", missing.join(", ")),
            })
        }
    }

    /// The API base URL derived from host and port.
    pub fn base_url(&self) -> Result<Url, CoreError> {
        mcs_api::base_url(self.host.trim(), self.port).map_err(|e| CoreError::BadConfig {
            message: format!("invalid device address '{}': {e}", self.host),
        })
    }
}

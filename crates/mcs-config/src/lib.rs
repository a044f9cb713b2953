//! Shared configuration for MCS tools.
//!
//! TOML device profiles, credential resolution (env + keyring + plaintext),
//! and translation to `mcs_core::ControllerConfig`. The CLI layers its
//! `GlobalOpts` overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use mcs_core::{ControllerConfig, PollingConfig, QueueConfig, TlsVerification};

/// Keyring service name for stored passwords.
pub const KEYRING_SERVICE: &str = "mcsctl";

/// Environment variable consulted first for the device password.
pub const PASSWORD_ENV: &str = "MCS_PASSWORD";

pub const POLLING_RATE_RANGE_MS: (u64, u64) = (500, 3_600_000);
pub const QUEUE_DELAY_RANGE_MS: (u64, u64) = (500, 2_000);

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Accept self-signed certificates. Unset means accept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Debug-level logging of gate waits, settles and polling.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: None,
            timeout: default_timeout(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named device profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Device IP address or host name.
    pub ip: String,

    /// HTTPS port.
    #[serde(default = "default_port")]
    pub port: u16,

    pub username: Option<String>,

    /// Password (plaintext -- prefer keyring or `MCS_PASSWORD`).
    pub password: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override the `[defaults]` TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    #[serde(default)]
    pub polling: PollingSection,

    #[serde(default)]
    pub queue: QueueSection,
}

fn default_port() -> u16 {
    443
}

impl Profile {
    /// Check the address and the polling/queue ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ip.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "ip".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::Validation {
                field: "port".into(),
                reason: "must be between 1 and 65535".into(),
            });
        }
        check_range("polling.rate_ms", self.polling.rate_ms, POLLING_RATE_RANGE_MS)?;
        check_range("queue.delay_ms", self.queue.delay_ms, QUEUE_DELAY_RANGE_MS)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Milliseconds between polls.
    #[serde(default = "default_polling_rate")]
    pub rate_ms: u64,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_ms: default_polling_rate(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueSection {
    /// Enforce a minimum delay between queued commands.
    #[serde(default)]
    pub enabled: bool,

    /// Minimum milliseconds between commands when enabled.
    #[serde(default = "default_queue_delay")]
    pub delay_ms: u64,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_ms: default_queue_delay(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_polling_rate() -> u64 {
    5_000
}
fn default_queue_delay() -> u64 {
    800
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "mcsctl", "mcsctl").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("mcsctl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from `path` + environment.
///
/// Environment keys use a `__` separator for nesting, e.g.
/// `MCS_PROFILES__STUDIO__IP=10.0.0.5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("MCS_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/password"),
    )?)
}

/// Resolve the device password: `MCS_PASSWORD`, then the system keyring,
/// then plaintext in the profile.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    let from_env = std::env::var(PASSWORD_ENV).ok();
    let from_keyring = || {
        keyring_entry(profile_name)
            .ok()
            .and_then(|entry| entry.get_password().ok())
    };

    first_password(from_env, from_keyring, profile.password.as_deref())
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Pick the first available password source. The keyring is only
/// consulted when the environment has none.
fn first_password(
    from_env: Option<String>,
    from_keyring: impl FnOnce() -> Option<String>,
    plaintext: Option<&str>,
) -> Option<String> {
    from_env
        .filter(|pw| !pw.is_empty())
        .or_else(from_keyring)
        .or_else(|| plaintext.map(str::to_owned))
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password)?;
    Ok(())
}

// ── Translation to core config ──────────────────────────────────────

fn check_range(field: &str, value: u64, (min, max): (u64, u64)) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Validation {
            field: field.into(),
            reason: format!("{value} is outside {min}..={max}"),
        })
    }
}

/// Build a `ControllerConfig` from a profile. An explicit `password`
/// skips the credential chain.
pub fn profile_to_controller_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    password: Option<SecretString>,
) -> Result<ControllerConfig, ConfigError> {
    profile.validate()?;

    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var("MCS_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;
    let password = match password {
        Some(password) => password,
        None => resolve_password(profile, profile_name)?,
    };

    let tls = tls_verification(profile, defaults);

    Ok(ControllerConfig {
        host: profile.ip.trim().to_owned(),
        port: profile.port,
        username,
        password,
        tls,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        polling: PollingConfig {
            enabled: profile.polling.enabled,
            interval: Duration::from_millis(profile.polling.rate_ms),
        },
        queue: QueueConfig {
            enabled: profile.queue.enabled,
            min_gap: Duration::from_millis(profile.queue.delay_ms),
            ..QueueConfig::default()
        },
    })
}

/// Devices ship self-signed certificates, so verification is off unless
/// `insecure = false` or a CA is configured. `insecure = true` always wins.
fn tls_verification(profile: &Profile, defaults: &Defaults) -> TlsVerification {
    match (profile.insecure.or(defaults.insecure), &profile.ca_cert) {
        (Some(true), _) => TlsVerification::DangerAcceptInvalid,
        (_, Some(ca_path)) => TlsVerification::CustomCa(ca_path.clone()),
        (Some(false), None) => TlsVerification::SystemDefaults,
        (None, None) => TlsVerification::DangerAcceptInvalid,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.output, "table");
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profile_defaults_fill_in() {
        let (_dir, path) = write_config(
            r#"
            default_profile = "studio"

            [profiles.studio]
            ip = "10.0.0.5"
            username = "operator"
            password = "hunter2"
            "#,
        );

        let cfg = load_config_from(&path).unwrap();
        let profile = &cfg.profiles["studio"];

        assert_eq!(cfg.default_profile.as_deref(), Some("studio"));
        assert_eq!(profile.port, 443);
        assert!(profile.polling.enabled);
        assert_eq!(profile.polling.rate_ms, 5_000);
        assert!(!profile.queue.enabled);
        assert_eq!(profile.queue.delay_ms, 800);
    }

    #[test]
    fn profile_translates_to_controller_config() {
        let (_dir, path) = write_config(
            r#"
            [profiles.default]
            ip = " 10.0.0.5 "
            port = 8443
            username = "operator"
            password = "hunter2"
            timeout = 10

            [profiles.default.queue]
            enabled = true
            delay_ms = 1500
            "#,
        );

        let cfg = load_config_from(&path).unwrap();
        let controller =
            profile_to_controller_config(&cfg.profiles["default"], "default", &cfg.defaults, None)
                .unwrap();

        assert_eq!(controller.host, "10.0.0.5");
        assert_eq!(controller.port, 8443);
        assert_eq!(controller.timeout, Duration::from_secs(10));
        assert_eq!(controller.queue.effective_min_gap(), Duration::from_millis(1500));
        assert_eq!(controller.polling.interval, Duration::from_millis(5_000));
    }

    #[test]
    fn out_of_range_delay_is_rejected() {
        let (_dir, path) = write_config(
            r#"
            [profiles.default]
            ip = "10.0.0.5"
            username = "operator"
            password = "hunter2"

            [profiles.default.queue]
            delay_ms = 100
            "#,
        );

        let cfg = load_config_from(&path).unwrap();
        let err =
            profile_to_controller_config(&cfg.profiles["default"], "default", &cfg.defaults, None)
                .unwrap_err();

        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "queue.delay_ms"));
    }

    fn bare_profile() -> Profile {
        Profile {
            ip: "10.0.0.5".into(),
            port: 443,
            username: Some("operator".into()),
            password: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
            polling: PollingSection::default(),
            queue: QueueSection::default(),
        }
    }

    #[test]
    fn tls_accepts_self_signed_unless_told_otherwise() {
        let defaults = Defaults::default();
        assert_eq!(
            tls_verification(&bare_profile(), &defaults),
            TlsVerification::DangerAcceptInvalid
        );

        let strict = Profile {
            insecure: Some(false),
            ..bare_profile()
        };
        assert_eq!(
            tls_verification(&strict, &defaults),
            TlsVerification::SystemDefaults
        );

        let pinned = Profile {
            ca_cert: Some(PathBuf::from("/etc/mcs/ca.pem")),
            ..bare_profile()
        };
        assert_eq!(
            tls_verification(&pinned, &defaults),
            TlsVerification::CustomCa(PathBuf::from("/etc/mcs/ca.pem"))
        );

        let forced = Profile {
            insecure: Some(true),
            ..pinned
        };
        assert_eq!(
            tls_verification(&forced, &defaults),
            TlsVerification::DangerAcceptInvalid
        );
    }

    #[test]
    fn tls_profile_overrides_defaults() {
        let strict_defaults = Defaults {
            insecure: Some(false),
            ..Defaults::default()
        };
        assert_eq!(
            tls_verification(&bare_profile(), &strict_defaults),
            TlsVerification::SystemDefaults
        );

        let relaxed = Profile {
            insecure: Some(true),
            ..bare_profile()
        };
        assert_eq!(
            tls_verification(&relaxed, &strict_defaults),
            TlsVerification::DangerAcceptInvalid
        );
    }

    #[test]
    fn strict_tls_flows_into_controller_config() {
        let (_dir, path) = write_config(
            r#"
            [defaults]
            insecure = false

            [profiles.default]
            ip = "10.0.0.5"
            username = "operator"
            "#,
        );

        let cfg = load_config_from(&path).unwrap();
        let controller = profile_to_controller_config(
            &cfg.profiles["default"],
            "default",
            &cfg.defaults,
            Some(SecretString::from("hunter2".to_string())),
        )
        .unwrap();

        assert_eq!(controller.tls, TlsVerification::SystemDefaults);
    }

    #[test]
    fn password_sources_in_priority_order() {
        let keyring_untouched = || -> Option<String> { panic!("keyring consulted") };
        assert_eq!(
            first_password(Some("env".into()), keyring_untouched, Some("plain")).as_deref(),
            Some("env")
        );
        assert_eq!(
            first_password(None, || Some("stored".into()), Some("plain")).as_deref(),
            Some("stored")
        );
        assert_eq!(
            first_password(Some(String::new()), || None, Some("plain")).as_deref(),
            Some("plain")
        );
        assert_eq!(first_password(None, || None, None), None);
    }

    #[test]
    fn saved_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                ip: "10.0.0.5".into(),
                port: 443,
                username: Some("operator".into()),
                password: None,
                ca_cert: None,
                insecure: None,
                timeout: None,
                polling: PollingSection::default(),
                queue: QueueSection::default(),
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        let profile = &loaded.profiles["default"];
        assert_eq!(profile.username.as_deref(), Some("operator"));
        assert!(profile.password.is_none());
    }

    #[test]
    fn plaintext_password_is_used_last() {
        let profile = Profile {
            ip: "10.0.0.5".into(),
            port: 443,
            username: Some("operator".into()),
            password: Some("hunter2".into()),
            ca_cert: None,
            insecure: None,
            timeout: None,
            polling: PollingSection::default(),
            queue: QueueSection::default(),
        };
        let picked = first_password(None, || None, profile.password.as_deref()).unwrap();
        assert_eq!(SecretString::from(picked).expose_secret(), "hunter2");
    }
}

//! Global flag overrides on top of `mcs_config` profiles.
//!
//! This is the single boundary where CLI flags cross into
//! `mcs_core::ControllerConfig`.

use std::path::PathBuf;
use std::time::Duration;

use mcs_config::{Config, Profile};
use mcs_core::{ControllerConfig, TlsVerification};
use secrecy::SecretString;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The config file in effect: `--config` or the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(mcs_config::config_path)
}

/// Load the config file, falling back to defaults when it is missing or unreadable.
pub fn load(global: &GlobalOpts) -> Config {
    mcs_config::load_config_from(&config_path(global)).unwrap_or_default()
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `ControllerConfig` from the config file, profile, and CLI overrides.
pub fn build_controller_config(global: &GlobalOpts) -> Result<ControllerConfig, CliError> {
    let cfg = load(global);
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        // An explicitly requested profile must exist
        None if global.profile.is_some() => {
            let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
            names.sort();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if names.is_empty() {
                    "(none)".into()
                } else {
                    names.join(", ")
                },
            });
        }
        None => flag_profile(global, &profile_name, &config_path(global))?,
    };

    apply_overrides(&mut profile, global);

    let password = global.password.clone().map(SecretString::from);
    let mut controller =
        mcs_config::profile_to_controller_config(&profile, &profile_name, &cfg.defaults, password)?;

    if global.insecure {
        controller.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(timeout) = global.timeout {
        controller.timeout = Duration::from_secs(timeout);
    }
    Ok(controller)
}

/// A profile built from `--host` alone, for use without a config file.
fn flag_profile(
    global: &GlobalOpts,
    profile_name: &str,
    path: &std::path::Path,
) -> Result<Profile, CliError> {
    let host = global.host.clone().ok_or_else(|| CliError::NoConfig {
        path: path.display().to_string(),
    })?;
    tracing::debug!(profile = profile_name, %host, "no profile on disk, using flags");
    Ok(Profile {
        ip: host,
        port: 443,
        username: None,
        password: None,
        ca_cert: None,
        insecure: None,
        timeout: None,
        polling: mcs_config::PollingSection::default(),
        queue: mcs_config::QueueSection::default(),
    })
}

fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref host) = global.host {
        profile.ip.clone_from(host);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if let Some(delay) = global.queue_delay {
        profile.queue.enabled = true;
        profile.queue.delay_ms = delay;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn controller_config(contents: &str, extra: &[&str]) -> ControllerConfig {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();

        let mut argv = vec![
            "mcsctl".to_owned(),
            "--config".to_owned(),
            path.display().to_string(),
            "--password".to_owned(),
            "hunter2".to_owned(),
        ];
        argv.extend(extra.iter().map(|s| (*s).to_owned()));
        argv.push("status".to_owned());

        let cli = Cli::try_parse_from(argv).unwrap();
        build_controller_config(&cli.global).unwrap()
    }

    const STRICT: &str = r#"
        [profiles.default]
        ip = "10.0.0.5"
        username = "operator"
        insecure = false
    "#;

    #[test]
    fn strict_profile_verifies_certificates() {
        let config = controller_config(STRICT, &[]);
        assert_eq!(config.tls, TlsVerification::SystemDefaults);
    }

    #[test]
    fn insecure_flag_overrides_strict_profile() {
        let config = controller_config(STRICT, &["-k"]);
        assert_eq!(config.tls, TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn unset_tls_accepts_self_signed() {
        let config = controller_config(
            r#"
            [profiles.default]
            ip = "10.0.0.5"
            username = "operator"
            "#,
            &["--timeout", "7"],
        );
        assert_eq!(config.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(config.timeout, Duration::from_secs(7));
    }
}

//! Config subcommand handlers.

use std::fmt::Write as _;
use std::io::BufRead;

use mcs_config::{Config, PollingSection, Profile, QueueSection};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    if let Some(insecure) = cfg.defaults.insecure {
        let _ = writeln!(out, "insecure = {insecure}");
    }
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "verbose = {}", cfg.defaults.verbose);

    let mut names: Vec<_> = cfg.profiles.iter().collect();
    names.sort_by(|a, b| a.0.cmp(b.0));
    for (name, p) in names {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "ip = \"{}\"", p.ip);
        let _ = writeln!(out, "port = {}", p.port);
        if let Some(ref u) = p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        let _ = writeln!(out, "polling = {{ enabled = {}, rate_ms = {} }}", p.polling.enabled, p.polling.rate_ms);
        let _ = writeln!(out, "queue = {{ enabled = {}, delay_ms = {} }}", p.queue.enabled, p.queue.delay_ms);
    }

    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load(global);
            output::print_output(format_config_redacted(&cfg).trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path(global).display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::SetProfile {
            name,
            no_polling,
            rate_ms,
            queue,
            delay_ms,
            default,
        } => {
            let ip = global.host.clone().ok_or_else(|| CliError::Validation {
                field: "host".into(),
                reason: "set-profile needs --host".into(),
            })?;
            let profile = Profile {
                ip,
                port: global.port.unwrap_or(443),
                username: global.username.clone(),
                password: None,
                ca_cert: None,
                insecure: global.insecure.then_some(true),
                timeout: global.timeout,
                polling: PollingSection {
                    enabled: !no_polling,
                    rate_ms,
                },
                queue: QueueSection {
                    enabled: queue,
                    delay_ms,
                },
            };

            profile.validate()?;

            let path = config::config_path(global);
            let mut cfg = mcs_config::load_config_from(&path).unwrap_or_default();
            cfg.profiles.insert(name.clone(), profile);
            if default || cfg.profiles.len() == 1 {
                cfg.default_profile = Some(name.clone());
            }
            mcs_config::save_config_to(&cfg, &path)?;

            if !global.quiet {
                eprintln!("Profile '{name}' saved to {}", path.display());
            }
            Ok(())
        }

        ConfigCommand::SetPassword { name } => {
            let cfg = config::load(global);
            let name = name.unwrap_or_else(|| config::active_profile_name(global, &cfg));

            let password = match global.password.clone() {
                Some(pw) => pw,
                None => {
                    if !global.quiet {
                        eprintln!("Password for profile '{name}':");
                    }
                    let mut line = String::new();
                    std::io::stdin().lock().read_line(&mut line)?;
                    line.trim_end_matches(['\r', '\n']).to_owned()
                }
            };
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "must not be empty".into(),
                });
            }

            mcs_config::store_password(&name, &password)?;
            if !global.quiet {
                eprintln!("Password stored in the system keyring for '{name}'");
            }
            Ok(())
        }
    }
}

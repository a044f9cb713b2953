//! Clap derive structures for the `mcsctl` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// mcsctl -- command-line control for MCS media devices
#[derive(Debug, Parser)]
#[command(
    name = "mcsctl",
    version,
    about = "Control MCS media devices from the command line",
    long_about = "Inspect and drive an MCS media-control device.\n\n\
        Every write goes through a serialized command queue, so layout,\n\
        audio and tile changes reach the device one at a time.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the config file
    #[arg(long, env = "MCS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Device profile to use
    #[arg(long, short = 'p', env = "MCS_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Device IP address or host name (overrides profile)
    #[arg(long, short = 'H', env = "MCS_HOST", global = true)]
    pub host: Option<String>,

    /// Device HTTPS port (overrides profile)
    #[arg(long, env = "MCS_PORT", global = true)]
    pub port: Option<u16>,

    /// Device username (overrides profile)
    #[arg(long, short = 'u', env = "MCS_USERNAME", global = true)]
    pub username: Option<String>,

    /// Device password (overrides keyring and profile)
    #[arg(long, env = "MCS_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "MCS_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "MCS_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "MCS_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Minimum milliseconds between queued commands (enables the queue delay)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(500..=2000))]
    pub queue_delay: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show connection status and what each output is showing
    #[command(alias = "st")]
    Status,

    /// Inspect and drive outputs
    #[command(alias = "out", alias = "o")]
    Outputs(OutputsArgs),

    /// Inspect and edit layouts
    #[command(alias = "lay", alias = "l")]
    Layouts(LayoutsArgs),

    /// List input channels
    #[command(alias = "ch")]
    Channels(ChannelsArgs),

    /// Poll the device and print changes as they happen
    Watch(WatchArgs),

    /// Send a raw authenticated request to the device API
    Request(RequestArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  OUTPUTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct OutputsArgs {
    #[command(subcommand)]
    pub command: OutputsCommand,
}

#[derive(Debug, Subcommand)]
pub enum OutputsCommand {
    /// List outputs with their active layout and audio
    #[command(alias = "ls")]
    List,

    /// Show output details
    Get {
        /// Output UUID or label
        output: String,
    },

    /// Put a layout on screen
    ApplyLayout {
        /// Output UUID or label
        output: String,

        /// Layout UUID or label
        layout: String,
    },

    /// Route a channel to the output's primary audio slot
    SetAudio {
        /// Output UUID or label
        output: String,

        /// Channel UUID or label
        channel: String,

        /// Audio track within the channel
        #[arg(long, default_value = "1")]
        audio_index: u32,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LAYOUTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LayoutsArgs {
    #[command(subcommand)]
    pub command: LayoutsCommand,
}

#[derive(Debug, Subcommand)]
pub enum LayoutsCommand {
    /// List layouts
    #[command(alias = "ls")]
    List,

    /// Show a layout and its tiles
    Get {
        /// Layout UUID or label
        layout: String,
    },

    /// Point one tile of a layout at a channel
    SetTile {
        /// Layout UUID or label
        layout: String,

        /// Tile index
        tile: u32,

        /// Channel UUID or label
        channel: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CHANNELS / WATCH / REQUEST
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ChannelsArgs {
    #[command(subcommand)]
    pub command: ChannelsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ChannelsCommand {
    /// List channels
    #[command(alias = "ls")]
    List,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Milliseconds between polls (overrides profile)
    #[arg(long, value_parser = clap::value_parser!(u64).range(500..=3_600_000))]
    pub interval: Option<u64>,
}

#[derive(Debug, Args)]
pub struct RequestArgs {
    /// HTTP method
    #[arg(value_parser = ["GET", "POST", "PUT", "PATCH", "DELETE"], ignore_case = true)]
    pub method: String,

    /// Path relative to the API root, e.g. `outputs/config/`
    pub path: String,

    /// JSON request body
    #[arg(long, short = 'd')]
    pub data: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG / COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (passwords masked)
    Show,

    /// Print the config file path
    Path,

    /// Create or replace a device profile from --host, --port and --username
    SetProfile {
        /// Profile name
        name: String,

        /// Disable state polling for this profile
        #[arg(long)]
        no_polling: bool,

        /// Milliseconds between polls
        #[arg(long, default_value = "5000")]
        rate_ms: u64,

        /// Enable the minimum delay between commands
        #[arg(long)]
        queue: bool,

        /// Minimum milliseconds between commands
        #[arg(long, default_value = "800")]
        delay_ms: u64,

        /// Make this the default profile
        #[arg(long)]
        default: bool,
    },

    /// Store a profile password in the system keyring (read from stdin)
    SetPassword {
        /// Profile name (defaults to the active profile)
        name: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

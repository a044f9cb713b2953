mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mcs_core::Controller;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity; the config file can ask for debug
    let verbose = if cli.global.verbose == 0 && config::load(&cli.global).defaults.verbose {
        2
    } else {
        cli.global.verbose
    };
    init_tracing(verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a device connection
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "mcsctl", &mut std::io::stdout());
            Ok(())
        }

        // Watch keeps the connection (and polling) alive
        Command::Watch(args) => {
            let controller_config = config::build_controller_config(&cli.global)?;
            commands::watch::handle(controller_config, &args, &cli.global).await
        }

        // Everything else is a single connect / act / disconnect cycle
        cmd => {
            let controller_config = config::build_controller_config(&cli.global)?;
            let global = &cli.global;

            tracing::debug!(command = ?cmd, "dispatching command");
            Controller::oneshot(controller_config, |controller| async move {
                Ok(commands::dispatch(cmd, &controller, global).await)
            })
            .await?
        }
    }
}

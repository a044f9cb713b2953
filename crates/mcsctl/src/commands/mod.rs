//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod channels;
pub mod config_cmd;
pub mod layouts;
pub mod outputs;
pub mod request;
pub mod status;
pub mod util;
pub mod watch;

use mcs_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::handle(controller, global),
        Command::Outputs(args) => outputs::handle(controller, args, global).await,
        Command::Layouts(args) => layouts::handle(controller, args, global).await,
        Command::Channels(args) => channels::handle(controller, &args, global),
        Command::Request(args) => request::handle(controller, args, global).await,
        // Config, Completions and Watch never reach a one-shot controller
        Command::Watch(_) | Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command cannot run on a one-shot connection".into(),
        )),
    }
}

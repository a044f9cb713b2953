//! Channel command handlers.

use tabled::Tabled;

use mcs_core::{Channel, Controller};

use crate::cli::{ChannelsArgs, ChannelsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ChannelRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Label")]
    label: String,
}

impl From<&Channel> for ChannelRow {
    fn from(c: &Channel) -> Self {
        Self {
            id: c.uuid.clone(),
            label: c.label.clone().unwrap_or_default(),
        }
    }
}

pub fn handle(controller: &Controller, args: &ChannelsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ChannelsCommand::List => {
            let snap = controller.snapshot();
            let out = output::render_list(
                &global.output,
                &snap.channels,
                |c| ChannelRow::from(c),
                |c| c.uuid.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

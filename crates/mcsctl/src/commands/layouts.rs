//! Layout command handlers.

use tabled::Tabled;

use mcs_core::{Command as CoreCommand, Controller, Layout};

use crate::cli::{GlobalOpts, LayoutsArgs, LayoutsCommand};
use crate::error::CliError;
use crate::output;

use super::outputs::report;
use super::util::{self, Kind};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct LayoutRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Tiles")]
    tiles: usize,
}

impl From<&Layout> for LayoutRow {
    fn from(l: &Layout) -> Self {
        Self {
            id: l.uuid.clone(),
            label: l.label.clone().unwrap_or_default(),
            tiles: l.tiles.as_ref().map_or(0, Vec::len),
        }
    }
}

fn detail(l: &Layout, controller: &Controller) -> String {
    let mut lines = vec![
        format!("ID:    {}", l.uuid),
        format!("Label: {}", l.label.as_deref().unwrap_or("-")),
    ];
    for tile in l.tiles.iter().flatten() {
        let source = match (&tile.channel, &tile.text) {
            (Some(channel), _) => util::describe(controller.store().channel_label(channel), channel),
            (None, Some(text)) => format!("\"{text}\""),
            (None, None) => "-".into(),
        };
        lines.push(format!("Tile {:<3} {:<8} {source}", tile.index, tile.kind));
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: LayoutsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        LayoutsCommand::List => {
            let snap = controller.snapshot();
            let out = output::render_list(
                &global.output,
                &snap.layouts,
                |l| LayoutRow::from(l),
                |l| l.uuid.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        LayoutsCommand::Get { layout } => {
            let uuid = util::resolve_id(controller, Kind::Layout, &layout)?;
            let found = controller.store().layout(&uuid).ok_or_else(|| CliError::NotFound {
                resource_type: "layout".into(),
                identifier: layout,
                list_command: "layouts list".into(),
            })?;
            let out = output::render_single(
                &global.output,
                &found,
                |l| detail(l, controller),
                |l| l.uuid.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        LayoutsCommand::SetTile {
            layout,
            tile,
            channel,
        } => {
            let layout = util::resolve_id(controller, Kind::Layout, &layout)?;
            let channel = util::resolve_id(controller, Kind::Channel, &channel)?;
            let label = util::describe(controller.store().channel_label(&channel), &channel);

            let result = controller
                .execute(CoreCommand::SetLayoutTile {
                    layout,
                    tile,
                    channel,
                })
                .await?;
            report(&result, &format!("Tile {tile} now shows {label}"), global);
            Ok(())
        }
    }
}

//! Output command handlers.

use tabled::Tabled;

use mcs_core::{Command as CoreCommand, CommandResult, Controller, Output, OutputSummary};

use crate::cli::{GlobalOpts, OutputsArgs, OutputsCommand};
use crate::error::CliError;
use crate::output;

use super::util::{self, Kind};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct OutputRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Layout")]
    layout: String,
    #[tabled(rename = "Audio")]
    audio: String,
    #[tabled(rename = "Audio PID")]
    pid: String,
}

impl OutputRow {
    fn new(summary: &OutputSummary, controller: &Controller) -> Self {
        let audio = summary.audio_channel.as_deref().map_or_else(String::new, |uuid| {
            controller
                .store()
                .channel_label(uuid)
                .unwrap_or_else(|| uuid.to_owned())
        });
        Self {
            id: summary.uuid.clone(),
            label: summary.label.clone(),
            layout: summary
                .layout_label
                .clone()
                .or_else(|| summary.layout.clone())
                .unwrap_or_default(),
            audio,
            pid: summary
                .mux_audio_pid
                .map(|pid| pid.to_string())
                .unwrap_or_default(),
        }
    }
}

fn detail(o: &Output) -> String {
    let mut lines = vec![
        format!("ID:      {}", o.uuid),
        format!("Label:   {}", o.label.as_deref().unwrap_or("-")),
        format!("Layout:  {}", o.active_layout().unwrap_or("-")),
        format!("Audio:   {}", o.audio_channel().unwrap_or("-")),
    ];
    if let Some(pid) = o.mux_audio_pid() {
        lines.push(format!("Mux PID: {pid}"));
    }
    for route in &o.input.audio {
        lines.push(format!(
            "Route {}: {} (track {})",
            route.index,
            if route.channel.is_empty() { "-" } else { route.channel.as_str() },
            route
                .audio_index
                .map_or_else(|| "-".into(), |i| i.to_string())
        ));
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: OutputsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        OutputsCommand::List => {
            let summaries = controller.store().output_summaries();
            let out = output::render_list(
                &global.output,
                &summaries,
                |s| OutputRow::new(s, controller),
                |s| s.uuid.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OutputsCommand::Get { output } => {
            let uuid = util::resolve_id(controller, Kind::Output, &output)?;
            let found = controller.store().output(&uuid).ok_or_else(|| CliError::NotFound {
                resource_type: "output".into(),
                identifier: output,
                list_command: "outputs list".into(),
            })?;
            let out = output::render_single(&global.output, &found, detail, |o| o.uuid.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OutputsCommand::ApplyLayout { output, layout } => {
            let output = util::resolve_id(controller, Kind::Output, &output)?;
            let layout = util::resolve_id(controller, Kind::Layout, &layout)?;
            let label = util::describe(controller.store().layout_label(&layout), &layout);

            if controller.store().is_layout_active(&output, &layout) {
                tracing::info!(%output, %layout, "layout already active, re-applying");
            }
            let result = controller
                .execute(CoreCommand::ApplyLayout { output, layout })
                .await?;
            report(&result, &format!("Layout {label} applied"), global);
            Ok(())
        }

        OutputsCommand::SetAudio {
            output,
            channel,
            audio_index,
        } => {
            let output = util::resolve_id(controller, Kind::Output, &output)?;
            let channel = util::resolve_id(controller, Kind::Channel, &channel)?;
            let label = util::describe(controller.store().channel_label(&channel), &channel);

            let result = controller
                .execute(CoreCommand::SetAudioChannel {
                    output,
                    channel,
                    audio_index,
                })
                .await?;
            report(&result, &format!("Audio routed to {label}"), global);
            Ok(())
        }
    }
}

/// Print what was written back: the message in table mode, the object otherwise.
pub(super) fn report(result: &CommandResult, message: &str, global: &GlobalOpts) {
    if global.quiet {
        return;
    }
    match (&global.output, result) {
        (crate::cli::OutputFormat::Table, _) => eprintln!("{message}"),
        (format, CommandResult::Output(o)) => {
            let out = output::render_single(format, o, detail, |o| o.uuid.clone());
            output::print_output(&out, false);
        }
        (format, CommandResult::Layout(l)) => {
            let out = output::render_single(format, l, |l| l.uuid.clone(), |l| l.uuid.clone());
            output::print_output(&out, false);
        }
    }
}

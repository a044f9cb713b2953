//! Status command: connection health plus what every output is showing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;

use mcs_core::{Controller, OutputSummary};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct Status {
    device: String,
    state: String,
    outputs: usize,
    layouts: usize,
    channels: usize,
    refreshed_at: Option<DateTime<Utc>>,
    age_secs: Option<i64>,
    screens: Vec<OutputSummary>,
}

#[derive(Tabled)]
struct ScreenRow {
    #[tabled(rename = "Output")]
    output: String,
    #[tabled(rename = "Layout")]
    layout: String,
    #[tabled(rename = "Audio")]
    audio: String,
}

fn refreshed(status: &Status) -> String {
    match (status.refreshed_at, status.age_secs) {
        (Some(at), Some(age)) => format!("{} ({age}s ago)", at.format("%Y-%m-%d %H:%M:%S UTC")),
        (Some(at), None) => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        (None, _) => "never".into(),
    }
}

fn detail(status: &Status, color: bool, controller: &Controller) -> String {
    let state = output::connection_label(&controller.connection_state(), color);
    let mut out = vec![
        format!("Device:    {}", status.device),
        format!("State:     {state}"),
        format!(
            "Inventory: {} outputs, {} layouts, {} channels",
            status.outputs, status.layouts, status.channels
        ),
        format!("Refreshed: {}", refreshed(status)),
    ];

    if !status.screens.is_empty() {
        let rows: Vec<ScreenRow> = status
            .screens
            .iter()
            .map(|s| ScreenRow {
                output: if s.label.is_empty() {
                    s.uuid.clone()
                } else {
                    s.label.clone()
                },
                layout: s
                    .layout_label
                    .clone()
                    .or_else(|| s.layout.clone())
                    .unwrap_or_else(|| "-".into()),
                audio: s.audio_channel.as_deref().map_or_else(
                    || "-".into(),
                    |uuid| {
                        controller
                            .store()
                            .channel_label(uuid)
                            .unwrap_or_else(|| uuid.to_owned())
                    },
                ),
            })
            .collect();
        out.push(String::new());
        out.push(
            tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string(),
        );
    }
    out.join("\n")
}

pub fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let store = controller.store();
    let status = Status {
        device: controller
            .config()
            .base_url()
            .map_or_else(|_| controller.config().host.clone(), |u| u.to_string()),
        state: output::connection_label(&controller.connection_state(), false),
        outputs: store.output_count(),
        layouts: store.layout_count(),
        channels: store.channel_count(),
        refreshed_at: store.last_refresh(),
        age_secs: store.data_age().map(|age| age.num_seconds()),
        screens: store.output_summaries(),
    };

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &status,
        |s| detail(s, color, controller),
        |s| s.state.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

//! Watch command: keep polling and print what changed on every refresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use mcs_core::{Controller, ControllerConfig, DeviceSnapshot, OutputSummary, PollState};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

/// Connect with polling forced on and stream changes until Ctrl-C or a
/// polling failure.
pub async fn handle(
    mut config: ControllerConfig,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    config.polling.enabled = true;
    if let Some(ms) = args.interval {
        config.polling.interval = Duration::from_millis(ms);
    }
    let interval = config.polling.interval;

    let controller = Controller::new(config);
    controller.connect().await?;
    let result = stream_changes(&controller, interval, global).await;
    controller.disconnect().await;
    result
}

async fn stream_changes(
    controller: &Controller,
    interval: Duration,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let mut snapshots = controller.store().subscribe_snapshot();
    let mut choices = controller.subscribe_choices();
    let mut poll_state = controller.subscribe_poll_state();

    let mut previous = screens(controller);
    announce(
        global,
        &format!(
            "Watching {} outputs every {}ms ({})",
            previous.len(),
            interval.as_millis(),
            output::connection_label(&controller.connection_state(), color)
        ),
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                return Ok(());
            }

            changed = snapshots.changed() => {
                if changed.is_err() {
                    return Err(CliError::Disconnected);
                }
                let snapshot: Arc<DeviceSnapshot> = snapshots.borrow_and_update().clone();
                let current = screens(controller);
                for line in diff_screens(&previous, &current) {
                    announce(global, &line);
                }
                debug!(refreshed_at = ?snapshot.refreshed_at, "snapshot updated");
                previous = current;
            }

            changed = choices.changed() => {
                if changed.is_err() {
                    return Err(CliError::Disconnected);
                }
                let set = choices.borrow_and_update().clone();
                announce(
                    global,
                    &format!(
                        "Inventory changed: {} outputs, {} layouts, {} channels",
                        set.outputs.len(),
                        set.layouts.len(),
                        set.channels.len()
                    ),
                );
            }

            changed = poll_state.changed() => {
                if changed.is_err() {
                    return Err(CliError::Disconnected);
                }
                let state = poll_state.borrow_and_update().clone();
                if let PollState::Halted { reason } = state {
                    return Err(mcs_core::CoreError::PollingFailed { message: reason }.into());
                }
            }
        }
    }
}

fn screens(controller: &Controller) -> HashMap<String, OutputSummary> {
    controller
        .store()
        .output_summaries()
        .into_iter()
        .map(|s| (s.uuid.clone(), s))
        .collect()
}

/// One line per added or removed output and per layout or audio change,
/// ordered by output id.
fn diff_screens(
    previous: &HashMap<String, OutputSummary>,
    current: &HashMap<String, OutputSummary>,
) -> Vec<String> {
    let mut ids: Vec<&String> = current.keys().chain(previous.keys()).collect();
    ids.sort();
    ids.dedup();

    let mut lines = Vec::new();
    for id in ids {
        let (before, now) = match (previous.get(id), current.get(id)) {
            (Some(before), Some(now)) => (before, now),
            (None, Some(now)) => {
                lines.push(format!("{}: appeared", display(id, now)));
                continue;
            }
            (Some(before), None) => {
                lines.push(format!("{}: disappeared", display(id, before)));
                continue;
            }
            (None, None) => continue,
        };
        let name = display(id, now);

        if before.layout != now.layout {
            lines.push(format!(
                "{name}: layout {} -> {}",
                layout_name(before),
                layout_name(now)
            ));
        }
        if before.audio_channel != now.audio_channel {
            lines.push(format!(
                "{name}: audio {} -> {}",
                before.audio_channel.as_deref().unwrap_or("-"),
                now.audio_channel.as_deref().unwrap_or("-")
            ));
        }
    }
    lines
}

fn display<'a>(id: &'a str, summary: &'a OutputSummary) -> &'a str {
    if summary.label.is_empty() {
        id
    } else {
        &summary.label
    }
}

fn layout_name(summary: &OutputSummary) -> &str {
    summary
        .layout_label
        .as_deref()
        .or(summary.layout.as_deref())
        .unwrap_or("-")
}

fn announce(global: &GlobalOpts, line: &str) {
    if !global.quiet {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        println!("{stamp} {line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(uuid: &str, label: &str, layout: Option<(&str, &str)>, audio: Option<&str>) -> OutputSummary {
        OutputSummary {
            uuid: uuid.into(),
            label: label.into(),
            layout: layout.map(|(id, _)| id.to_owned()),
            layout_label: layout.map(|(_, label)| label.to_owned()),
            audio_channel: audio.map(str::to_owned),
            mux_audio_pid: None,
        }
    }

    fn map(items: Vec<OutputSummary>) -> HashMap<String, OutputSummary> {
        items.into_iter().map(|s| (s.uuid.clone(), s)).collect()
    }

    #[test]
    fn reports_layout_and_audio_changes() {
        let before = map(vec![
            summary("out-1", "Wall", Some(("lay-1", "Quad")), Some("ch-1")),
            summary("out-2", "", Some(("lay-1", "Quad")), None),
        ]);
        let after = map(vec![
            summary("out-1", "Wall", Some(("lay-2", "Full")), Some("ch-1")),
            summary("out-2", "", Some(("lay-1", "Quad")), Some("ch-3")),
        ]);

        assert_eq!(
            diff_screens(&before, &after),
            vec![
                "Wall: layout Quad -> Full".to_owned(),
                "out-2: audio - -> ch-3".to_owned(),
            ]
        );
    }

    #[test]
    fn new_outputs_are_announced() {
        let before = map(vec![]);
        let after = map(vec![summary("out-1", "Wall", None, None)]);
        assert_eq!(diff_screens(&before, &after), vec!["Wall: appeared".to_owned()]);
    }

    #[test]
    fn removed_outputs_are_announced() {
        let before = map(vec![
            summary("out-1", "Wall", None, None),
            summary("out-2", "", None, None),
        ]);
        let after = map(vec![summary("out-1", "Wall", None, None)]);
        assert_eq!(
            diff_screens(&before, &after),
            vec!["out-2: disappeared".to_owned()]
        );
    }

    #[test]
    fn unchanged_state_is_silent() {
        let state = map(vec![summary("out-1", "Wall", Some(("lay-1", "Quad")), None)]);
        assert!(diff_screens(&state, &state).is_empty());
    }
}

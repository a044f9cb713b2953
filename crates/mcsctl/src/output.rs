//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use mcs_core::ConnectionState;

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Human label for a connection state, colored when enabled.
pub fn connection_label(state: &ConnectionState, color: bool) -> String {
    let (text, ok) = match state {
        ConnectionState::Disconnected => ("disconnected".to_owned(), false),
        ConnectionState::Connecting => ("connecting".to_owned(), true),
        ConnectionState::Ok => ("ok".to_owned(), true),
        ConnectionState::BadConfig { reason } => (format!("bad config: {reason}"), false),
        ConnectionState::ConnectionFailure { reason } => {
            (format!("connection failure: {reason}"), false)
        }
    };
    match (color, ok) {
        (false, _) => text,
        (true, true) => text.green().to_string(),
        (true, false) => text.red().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the items via serde
/// - `yaml`: serializes via serde_yaml
/// - `plain`: calls `id_fn` on each item to emit one identifier per line
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses a custom `detail_fn` that returns a pre-formatted string,
/// since single-item detail views don't use `Tabled` derive.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {e}\"}}"))
}

/// YAML output.
fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("error: serialization failed: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Item {
        id: String,
        label: String,
    }

    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: String,
    }

    fn items() -> Vec<Item> {
        vec![
            Item {
                id: "out-1".into(),
                label: "Wall".into(),
            },
            Item {
                id: "out-2".into(),
                label: "Lobby".into(),
            },
        ]
    }

    #[test]
    fn plain_emits_one_id_per_line() {
        let out = render_list(
            &OutputFormat::Plain,
            &items(),
            |i| ItemRow { id: i.id.clone() },
            |i| i.id.clone(),
        );
        assert_eq!(out, "out-1\nout-2");
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render_list(
            &OutputFormat::JsonCompact,
            &items(),
            |i| ItemRow { id: i.id.clone() },
            |i| i.id.clone(),
        );
        assert_eq!(
            out,
            r#"[{"id":"out-1","label":"Wall"},{"id":"out-2","label":"Lobby"}]"#
        );
    }

    #[test]
    fn table_includes_headers() {
        let out = render_list(
            &OutputFormat::Table,
            &items(),
            |i| ItemRow { id: i.id.clone() },
            |i| i.id.clone(),
        );
        assert!(out.contains("ID"));
        assert!(out.contains("out-2"));
    }

    #[test]
    fn uncolored_connection_labels() {
        assert_eq!(connection_label(&ConnectionState::Ok, false), "ok");
        assert_eq!(
            connection_label(
                &ConnectionState::BadConfig {
                    reason: "missing configuration: ip".into()
                },
                false
            ),
            "bad config: missing configuration: ip"
        );
    }
}

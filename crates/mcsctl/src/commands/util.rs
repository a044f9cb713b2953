//! Shared helpers for command handlers.

use mcs_core::{Choice, Controller};

use crate::error::CliError;

/// Which choice list an identifier is resolved against.
#[derive(Debug, Clone, Copy)]
pub enum Kind {
    Output,
    Layout,
    Channel,
}

impl Kind {
    fn name(self) -> &'static str {
        match self {
            Self::Output => "output",
            Self::Layout => "layout",
            Self::Channel => "channel",
        }
    }

    fn list_command(self) -> &'static str {
        match self {
            Self::Output => "outputs list",
            Self::Layout => "layouts list",
            Self::Channel => "channels list",
        }
    }
}

/// Resolve a UUID or label to a UUID via the cached choice lists.
pub fn resolve_id(controller: &Controller, kind: Kind, identifier: &str) -> Result<String, CliError> {
    let choices = controller.choices();
    let list = match kind {
        Kind::Output => &choices.outputs,
        Kind::Layout => &choices.layouts,
        Kind::Channel => &choices.channels,
    };
    match_choice(list, kind, identifier)
}

fn match_choice(list: &[Choice], kind: Kind, identifier: &str) -> Result<String, CliError> {
    if let Some(choice) = list.iter().find(|c| c.id == identifier) {
        return Ok(choice.id.clone());
    }

    let by_label: Vec<&Choice> = list
        .iter()
        .filter(|c| c.label.eq_ignore_ascii_case(identifier))
        .collect();
    match by_label.as_slice() {
        [only] => Ok(only.id.clone()),
        [] => Err(CliError::NotFound {
            resource_type: kind.name().into(),
            identifier: identifier.into(),
            list_command: kind.list_command().into(),
        }),
        many => Err(CliError::Ambiguous {
            resource_type: kind.name().into(),
            identifier: identifier.into(),
            candidates: many
                .iter()
                .map(|c| c.id.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// `label (uuid)` for confirmations, or just the uuid when unlabeled.
pub fn describe(label: Option<String>, uuid: &str) -> String {
    match label {
        Some(label) if !label.is_empty() && label != uuid => format!("{label} ({uuid})"),
        _ => uuid.to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn choices() -> Vec<Choice> {
        vec![
            Choice {
                id: "lay-1".into(),
                label: "Quad".into(),
            },
            Choice {
                id: "lay-2".into(),
                label: "Full".into(),
            },
            Choice {
                id: "lay-3".into(),
                label: "full".into(),
            },
        ]
    }

    #[test]
    fn uuid_wins_over_label() {
        assert_eq!(match_choice(&choices(), Kind::Layout, "lay-2").unwrap(), "lay-2");
    }

    #[test]
    fn label_match_is_case_insensitive() {
        assert_eq!(match_choice(&choices(), Kind::Layout, "QUAD").unwrap(), "lay-1");
    }

    #[test]
    fn duplicate_labels_are_ambiguous() {
        let err = match_choice(&choices(), Kind::Layout, "Full").unwrap_err();
        assert!(matches!(err, CliError::Ambiguous { ref candidates, .. } if candidates == "lay-2, lay-3"));
    }

    #[test]
    fn unknown_identifier_is_not_found() {
        let err = match_choice(&choices(), Kind::Channel, "nope").unwrap_err();
        assert!(matches!(err, CliError::NotFound { ref list_command, .. } if list_command == "channels list"));
    }

    #[test]
    fn describe_skips_redundant_label() {
        assert_eq!(describe(Some("Wall".into()), "out-1"), "Wall (out-1)");
        assert_eq!(describe(None, "out-1"), "out-1");
        assert_eq!(describe(Some("out-1".into()), "out-1"), "out-1");
    }
}

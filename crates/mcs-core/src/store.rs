// ── Device state cache ──
//
// Holds the last polled outputs, layouts and channels as one immutable
// snapshot, replaced wholesale on every successful refresh. Derived choice
// lists are published separately and only when they change by value, so
// subscribers can rebuild selection menus without diffing themselves.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mcs_api::{Channel, Labeled, Layout, Output};
use serde::Serialize;
use tokio::sync::watch;

// ── Choice ───────────────────────────────────────────────────────

/// An `{id, label}` pair for selection menus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub id: String,
    pub label: String,
}

impl Choice {
    /// Build a choice, falling back to the uuid when the label is empty.
    pub fn from_entity(entity: &impl Labeled) -> Self {
        let id = entity.uuid().to_owned();
        let label = entity
            .label()
            .filter(|label| !label.is_empty())
            .map_or_else(|| id.clone(), str::to_owned);
        Self { id, label }
    }
}

/// Choice lists derived from one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChoiceSet {
    pub outputs: Vec<Choice>,
    pub layouts: Vec<Choice>,
    pub channels: Vec<Choice>,
}

impl ChoiceSet {
    fn derive(snapshot: &DeviceSnapshot) -> Self {
        Self {
            outputs: snapshot.outputs.iter().map(Choice::from_entity).collect(),
            layouts: snapshot.layouts.iter().map(Choice::from_entity).collect(),
            channels: snapshot.channels.iter().map(Choice::from_entity).collect(),
        }
    }
}

// ── Snapshot ─────────────────────────────────────────────────────

/// Everything the last successful poll returned.
#[derive(Debug, Clone, Default)]
pub struct DeviceSnapshot {
    pub outputs: Vec<Output>,
    pub layouts: Vec<Layout>,
    pub channels: Vec<Channel>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Flattened view of one output for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSummary {
    pub uuid: String,
    pub label: String,
    pub layout: Option<String>,
    pub layout_label: Option<String>,
    pub audio_channel: Option<String>,
    pub mux_audio_pid: Option<i64>,
}

// ── StateStore ───────────────────────────────────────────────────

/// Reactive cache of device state.
///
/// Single writer (`Controller::refresh_state`), many readers. Readers get
/// cheap `Arc` snapshots and never observe a partially applied refresh.
pub struct StateStore {
    snapshot: watch::Sender<Arc<DeviceSnapshot>>,
    choices: watch::Sender<Arc<ChoiceSet>>,
}

impl StateStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(DeviceSnapshot::default()));
        let (choices, _) = watch::channel(Arc::new(ChoiceSet::default()));
        Self { snapshot, choices }
    }

    /// Replace the cached state. Returns `true` when any choice list
    /// differs from the previous one, in which case choice subscribers are
    /// notified.
    pub(crate) fn apply_snapshot(
        &self,
        outputs: Vec<Output>,
        layouts: Vec<Layout>,
        channels: Vec<Channel>,
    ) -> bool {
        let snapshot = DeviceSnapshot {
            outputs,
            layouts,
            channels,
            refreshed_at: Some(Utc::now()),
        };
        let derived = ChoiceSet::derive(&snapshot);

        self.snapshot.send_replace(Arc::new(snapshot));
        self.choices.send_if_modified(|current| {
            if **current == derived {
                false
            } else {
                *current = Arc::new(derived);
                true
            }
        })
    }

    /// Drop all cached state (used on disconnect).
    pub(crate) fn clear(&self) {
        self.snapshot.send_replace(Arc::new(DeviceSnapshot::default()));
        self.choices.send_if_modified(|current| {
            if current.outputs.is_empty() && current.layouts.is_empty() && current.channels.is_empty() {
                false
            } else {
                *current = Arc::new(ChoiceSet::default());
                true
            }
        });
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn snapshot(&self) -> Arc<DeviceSnapshot> {
        Arc::clone(&self.snapshot.borrow())
    }

    pub fn choices(&self) -> Arc<ChoiceSet> {
        Arc::clone(&self.choices.borrow())
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<Arc<DeviceSnapshot>> {
        self.snapshot.subscribe()
    }

    /// Notified only when a choice list changes by value.
    pub fn subscribe_choices(&self) -> watch::Receiver<Arc<ChoiceSet>> {
        self.choices.subscribe()
    }

    // ── Single-entity lookups ────────────────────────────────────────

    pub fn output(&self, uuid: &str) -> Option<Output> {
        self.snapshot.borrow().outputs.iter().find(|o| o.uuid == uuid).cloned()
    }

    pub fn layout(&self, uuid: &str) -> Option<Layout> {
        self.snapshot.borrow().layouts.iter().find(|l| l.uuid == uuid).cloned()
    }

    pub fn channel(&self, uuid: &str) -> Option<Channel> {
        self.snapshot.borrow().channels.iter().find(|c| c.uuid == uuid).cloned()
    }

    pub fn layout_label(&self, uuid: &str) -> Option<String> {
        self.snapshot
            .borrow()
            .layouts
            .iter()
            .find(|l| l.uuid == uuid)
            .and_then(|l| l.label.clone())
    }

    pub fn channel_label(&self, uuid: &str) -> Option<String> {
        self.snapshot
            .borrow()
            .channels
            .iter()
            .find(|c| c.uuid == uuid)
            .and_then(|c| c.label.clone())
    }

    /// Whether `layout` is the layout currently on screen at `output`.
    pub fn is_layout_active(&self, output: &str, layout: &str) -> bool {
        self.snapshot
            .borrow()
            .outputs
            .iter()
            .find(|o| o.uuid == output)
            .and_then(Output::active_layout)
            .is_some_and(|active| active == layout)
    }

    /// Per-output status, with layout labels resolved against the cache.
    pub fn output_summaries(&self) -> Vec<OutputSummary> {
        let snapshot = self.snapshot();
        snapshot
            .outputs
            .iter()
            .map(|output| {
                let layout = output.active_layout().map(str::to_owned);
                let layout_label = layout.as_deref().and_then(|uuid| {
                    snapshot
                        .layouts
                        .iter()
                        .find(|l| l.uuid == uuid)
                        .and_then(|l| l.label.clone())
                });
                OutputSummary {
                    uuid: output.uuid.clone(),
                    label: output.label.clone().unwrap_or_default(),
                    layout,
                    layout_label,
                    audio_channel: output.audio_channel().map(str::to_owned),
                    mux_audio_pid: output.mux_audio_pid(),
                }
            })
            .collect()
    }

    // ── Count accessors ──────────────────────────────────────────────

    pub fn output_count(&self) -> usize {
        self.snapshot.borrow().outputs.len()
    }

    pub fn layout_count(&self) -> usize {
        self.snapshot.borrow().layouts.len()
    }

    pub fn channel_count(&self) -> usize {
        self.snapshot.borrow().channels.len()
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.snapshot.borrow().refreshed_at
    }

    /// How long ago the last refresh happened, or `None` if never refreshed.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_refresh().map(|t| Utc::now() - t)
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn output(uuid: &str, label: Option<&str>, layout: &str) -> Output {
        serde_json::from_value(json!({
            "uuid": uuid,
            "label": label,
            "input": { "layouts": [layout], "audio": [{ "index": 1, "channel": "ch-1" }] }
        }))
        .unwrap()
    }

    fn layout(uuid: &str, label: &str) -> Layout {
        serde_json::from_value(json!({ "uuid": uuid, "label": label })).unwrap()
    }

    fn channel(uuid: &str, label: &str) -> Channel {
        serde_json::from_value(json!({ "uuid": uuid, "label": label })).unwrap()
    }

    #[test]
    fn choice_label_falls_back_to_uuid() {
        assert_eq!(
            Choice::from_entity(&output("out-1", None, "lay-1")).label,
            "out-1"
        );
        assert_eq!(
            Choice::from_entity(&output("out-2", Some(""), "lay-1")).label,
            "out-2"
        );
        assert_eq!(
            Choice::from_entity(&output("out-3", Some("Program"), "lay-1")).label,
            "Program"
        );
    }

    #[test]
    fn unchanged_refresh_does_not_notify() {
        let store = StateStore::new();
        let mut rx = store.subscribe_choices();

        let changed = store.apply_snapshot(
            vec![output("out-1", Some("Program"), "lay-1")],
            vec![layout("lay-1", "Quad")],
            vec![channel("ch-1", "Cam 1")],
        );
        assert!(changed);
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        // Same choices, different active layout: snapshot moves, choices do not.
        let changed = store.apply_snapshot(
            vec![output("out-1", Some("Program"), "lay-2")],
            vec![layout("lay-1", "Quad")],
            vec![channel("ch-1", "Cam 1")],
        );
        assert!(!changed);
        assert!(!rx.has_changed().unwrap());
        assert!(store.is_layout_active("out-1", "lay-2"));
    }

    #[test]
    fn added_output_notifies_once() {
        let store = StateStore::new();
        store.apply_snapshot(vec![output("out-1", Some("A"), "lay-1")], vec![], vec![]);
        let mut rx = store.subscribe_choices();

        let changed = store.apply_snapshot(
            vec![
                output("out-1", Some("A"), "lay-1"),
                output("out-2", Some("B"), "lay-1"),
            ],
            vec![],
            vec![],
        );

        assert!(changed);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().outputs.len(), 2);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn lookups_and_counts() {
        let store = StateStore::new();
        assert!(store.last_refresh().is_none());
        assert!(store.data_age().is_none());

        store.apply_snapshot(
            vec![output("out-1", Some("Program"), "lay-1")],
            vec![layout("lay-1", "Quad"), layout("lay-2", "Full")],
            vec![channel("ch-1", "Cam 1")],
        );

        assert_eq!(store.output_count(), 1);
        assert_eq!(store.layout_count(), 2);
        assert_eq!(store.channel_count(), 1);
        assert_eq!(store.layout_label("lay-2").as_deref(), Some("Full"));
        assert_eq!(store.channel_label("ch-1").as_deref(), Some("Cam 1"));
        assert!(store.channel("ch-9").is_none());
        assert!(store.is_layout_active("out-1", "lay-1"));
        assert!(!store.is_layout_active("out-9", "lay-1"));
        assert!(store.last_refresh().is_some());
        let age = store.data_age().unwrap();
        assert!(age >= chrono::Duration::zero() && age < chrono::Duration::seconds(60));

        let summaries = store.output_summaries();
        assert_eq!(summaries[0].layout_label.as_deref(), Some("Quad"));
        assert_eq!(summaries[0].audio_channel.as_deref(), Some("ch-1"));
    }
}

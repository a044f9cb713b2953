// ── Command API ──
//
// All device writes flow through a unified `Command` enum. The controller
// runs each one inside a single scheduler slot as read -> clone -> mutate
// -> PUT. The mutations edit a copy of the raw JSON the device returned and
// revalidate it, so every field the command does not touch goes back
// byte-for-byte. They are pure functions and are tested without a device.

use mcs_api::{Document, Layout, Output};
use serde_json::{Map, Value, json};

use crate::error::CoreError;

/// Audio routing slot edited by [`Command::SetAudioChannel`].
pub const PRIMARY_AUDIO_ROUTE: u32 = 1;

/// All write operations against an MCS device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Put `layout` on screen at `output`.
    ApplyLayout { output: String, layout: String },
    /// Route `channel` to the primary audio slot of `output`.
    SetAudioChannel {
        output: String,
        channel: String,
        audio_index: u32,
    },
    /// Point tile `tile` of `layout` at video `channel`.
    SetLayoutTile {
        layout: String,
        tile: u32,
        channel: String,
    },
}

impl Command {
    /// Diagnostic label for logs and scheduler tracing.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ApplyLayout { .. } => "applyLayout",
            Self::SetAudioChannel { .. } => "setAudioChannel",
            Self::SetLayoutTile { .. } => "modifyLayout",
        }
    }

    /// UUID of the entity the command rewrites.
    pub fn target(&self) -> &str {
        match self {
            Self::ApplyLayout { output, .. } | Self::SetAudioChannel { output, .. } => output,
            Self::SetLayoutTile { layout, .. } => layout,
        }
    }
}

/// The object as it was written back to the device.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Output(Output),
    Layout(Layout),
}

// ── Mutations ────────────────────────────────────────────────────

/// A copy of `output` showing `layout`.
pub fn with_layout(
    output: &Document<Output>,
    layout: &str,
) -> Result<Document<Output>, CoreError> {
    let mut raw = output.raw.clone();
    object_field(&mut raw, "input")?.insert("layouts".into(), json!([layout]));
    Ok(Document::from_raw("output", raw)?)
}

/// A copy of `output` with the primary audio route set to `channel`.
///
/// The route is created when the output has none.
pub fn with_audio_channel(
    output: &Document<Output>,
    channel: &str,
    audio_index: u32,
) -> Result<Document<Output>, CoreError> {
    let mut raw = output.raw.clone();
    let routes = array_field(object_field(&mut raw, "input")?, "audio")?;

    let position = routes
        .iter()
        .position(|route| has_index(route, PRIMARY_AUDIO_ROUTE));
    match position
        .and_then(|p| routes.get_mut(p))
        .and_then(Value::as_object_mut)
    {
        Some(route) => {
            route.insert("channel".into(), json!(channel));
            route.insert("audio_index".into(), json!(audio_index));
        }
        None => routes.push(json!({
            "index": PRIMARY_AUDIO_ROUTE,
            "channel": channel,
            "audio_index": audio_index,
            "pid": null,
        })),
    }
    Ok(Document::from_raw("output", raw)?)
}

/// A copy of `layout` with tile `tile` showing `channel`.
pub fn with_tile_channel(
    layout: &Document<Layout>,
    tile: u32,
    channel: &str,
) -> Result<Document<Layout>, CoreError> {
    let mut raw = layout.raw.clone();
    let target = raw
        .get_mut("tiles")
        .and_then(Value::as_array_mut)
        .and_then(|tiles| tiles.iter_mut().find(|t| has_index(t, tile)))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| CoreError::NotFound {
            entity_type: "tile".into(),
            identifier: format!("{tile} in layout {}", layout.model.uuid),
        })?;
    target.insert("channel".into(), json!(channel));
    Ok(Document::from_raw("layout", raw)?)
}

fn has_index(entry: &Value, index: u32) -> bool {
    entry.get("index").and_then(Value::as_u64) == Some(u64::from(index))
}

/// The object under `key`, created when missing or null.
fn object_field<'a>(
    map: &'a mut Map<String, Value>,
    key: &str,
) -> Result<&'a mut Map<String, Value>, CoreError> {
    let slot = map.entry(key).or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Object(Map::new());
    }
    slot.as_object_mut()
        .ok_or_else(|| CoreError::Internal(format!("`{key}` is not an object")))
}

/// The array under `key`, created when missing or null.
fn array_field<'a>(
    map: &'a mut Map<String, Value>,
    key: &str,
) -> Result<&'a mut Vec<Value>, CoreError> {
    let slot = map.entry(key).or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    slot.as_array_mut()
        .ok_or_else(|| CoreError::Internal(format!("`{key}` is not an array")))
}

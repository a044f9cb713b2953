// Wire models for MCS configuration resources
//
// Outputs, layouts and channels are validated at the deserialization
// boundary. The typed views normalize nulls for reading; writes go through
// `Document`, which carries the object exactly as the device returned it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::Error;

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Entities that can be presented as an `{id, label}` choice.
pub trait Labeled {
    fn uuid(&self) -> &str;
    fn label(&self) -> Option<&str>;
}

macro_rules! impl_labeled {
    ($($ty:ty),+ $(,)?) => {
        $(impl Labeled for $ty {
            fn uuid(&self) -> &str {
                &self.uuid
            }

            fn label(&self) -> Option<&str> {
                self.label.as_deref()
            }
        })+
    };
}

// ── Output ───────────────────────────────────────────────────────────

/// A video/audio output endpoint with an assigned layout and audio routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub input: OutputInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muxing: Option<Muxing>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputInput {
    /// Assigned layouts; the first entry is the one on screen.
    #[serde(default, deserialize_with = "null_as_default")]
    pub layouts: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub audio: Vec<AudioRoute>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One audio routing slot of an output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioRoute {
    pub index: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_index: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Muxing {
    #[serde(default, deserialize_with = "null_as_default")]
    pub audio: Vec<MuxAudio>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuxAudio {
    #[serde(default)]
    pub pid: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Output {
    /// The layout currently shown on this output.
    pub fn active_layout(&self) -> Option<&str> {
        self.input.layouts.first().map(String::as_str)
    }

    /// Channel of the first audio route.
    pub fn audio_channel(&self) -> Option<&str> {
        self.input
            .audio
            .first()
            .map(|route| route.channel.as_str())
            .filter(|channel| !channel.is_empty())
    }

    /// PID of the first muxed audio stream.
    pub fn mux_audio_pid(&self) -> Option<i64> {
        self.muxing.as_ref()?.audio.first()?.pid
    }
}

// ── Layout ───────────────────────────────────────────────────────────

/// A tile arrangement mapping screen regions to channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles: Option<Vec<Tile>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub index: u32,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Layout {
    pub fn tile(&self, index: u32) -> Option<&Tile> {
        self.tiles.as_deref()?.iter().find(|t| t.index == index)
    }
}

// ── Channel ──────────────────────────────────────────────────────────

/// A selectable video or audio source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_labeled!(Output, Layout, Channel);

// ── Document ─────────────────────────────────────────────────────────

/// A single resource as read from the device.
///
/// `raw` is the JSON object exactly as received and is what a full-object PUT
/// sends back. `model` is the validated view of `raw`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<T> {
    pub model: T,
    pub raw: Map<String, Value>,
}

impl<T: DeserializeOwned> Document<T> {
    /// Validate `raw` against the typed model.
    pub fn from_raw(kind: &'static str, raw: Map<String, Value>) -> Result<Self, Error> {
        let model =
            serde_json::from_value(Value::Object(raw.clone())).map_err(|e| {
                Error::Deserialization {
                    message: format!("{kind}: {e}"),
                    body: Value::Object(raw.clone()).to_string(),
                }
            })?;
        Ok(Self { model, raw })
    }
}

// ── Envelope normalization ───────────────────────────────────────────

/// Decode a collection that arrives either as a bare array or wrapped in a
/// `{data: [...]}` envelope.
///
/// Entries that fail validation are logged and skipped so one malformed
/// record cannot poison the whole refresh.
pub(crate) fn decode_listing<T: DeserializeOwned>(
    kind: &'static str,
    value: Value,
) -> Result<Vec<T>, Error> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(Error::Deserialization {
                    message: format!("{kind} listing: expected an array or {{data: [...]}}"),
                    body: other.to_string(),
                });
            }
        },
        Value::Null => Vec::new(),
        other => {
            return Err(Error::Deserialization {
                message: format!("{kind} listing: expected an array or {{data: [...]}}"),
                body: other.to_string(),
            });
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!(kind, error = %e, "skipping malformed entry");
                None
            }
        })
        .collect())
}

/// Decode a single resource, bare or wrapped in `{data: {...}}`.
pub(crate) fn decode_document<T: DeserializeOwned>(
    kind: &'static str,
    value: Value,
) -> Result<Document<T>, Error> {
    let value = match value {
        Value::Object(mut map) if matches!(map.get("data"), Some(Value::Object(_))) => {
            map.remove("data").unwrap_or_default()
        }
        other => other,
    };

    match value {
        Value::Object(raw) => Document::from_raw(kind, raw),
        other => Err(Error::Deserialization {
            message: format!("{kind}: expected an object"),
            body: other.to_string(),
        }),
    }
}

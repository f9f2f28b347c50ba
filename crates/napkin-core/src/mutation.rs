//! Mutation records as emitted by the generator.
//!
//! Accepts both the engine's field names (`handle`, `kind`, `properties`) and
//! the ones generators are prompted with (`id`, `type`, `props`).

use serde::{Deserialize, Serialize};

use crate::handles::Handle;
use crate::Terminal;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Add,
    Edit,
    Delete,
}

/// What a record's `kind` string asks for, after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Container,
    Text,
    Note,
    Connector,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MutationRecord {
    #[serde(alias = "id")]
    pub handle: Handle,
    #[serde(default, alias = "type")]
    pub kind: String,
    #[serde(default)]
    pub action: Action,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, alias = "props")]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl MutationRecord {
    pub fn new(handle: Handle, kind: &str) -> Self {
        Self {
            handle,
            kind: kind.to_string(),
            action: Action::Add,
            x: None,
            y: None,
            properties: serde_json::Map::new(),
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn with_prop(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Unknown or missing kinds become containers.
    pub fn record_kind(&self) -> RecordKind {
        match self.kind.trim().to_ascii_lowercase().as_str() {
            "arrow" | "connector" | "edge" | "line" => RecordKind::Connector,
            "text" | "label" | "title" => RecordKind::Text,
            "note" | "sticky" | "sticky-note" => RecordKind::Note,
            _ => RecordKind::Container,
        }
    }

    pub fn is_connector(&self) -> bool {
        self.record_kind() == RecordKind::Connector
    }

    pub fn str_prop(&self, key: &str) -> Option<&str> {
        self.properties.get(key)?.as_str()
    }

    /// Numeric property; numeric strings are accepted too.
    pub fn num_prop(&self, key: &str) -> Option<f64> {
        value_as_f64(self.properties.get(key)?)
    }

    /// The handle a connector end refers to (`from` for start, `to` for end).
    pub fn endpoint(&self, terminal: Terminal) -> Option<Handle> {
        let key = match terminal {
            Terminal::Start => "from",
            Terminal::End => "to",
        };
        let value = self.properties.get(key)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .or_else(|| value.as_str()?.trim().parse().ok())
    }
}

/// Positions that are not numbers are treated as absent, so the factory
/// defaults apply instead of the whole record being rejected.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_as_f64(&value))
}

pub(crate) fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str()?.trim().parse().ok())
        .filter(|f: &f64| f.is_finite())
}

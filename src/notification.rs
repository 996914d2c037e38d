//! Canonical notification record and the raw batch it is built from

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::errors::{AppError, AppResult};

/// Source-provided timestamp, kept in whatever shape the server sent it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Number(serde_json::Number),
    Text(String),
    Missing,
}

impl Timestamp {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => Self::Number(n.clone()),
            Some(Value::String(s)) => Self::Text(s.clone()),
            Some(Value::Bool(b)) => Self::Text(b.to_string()),
            _ => Self::Missing,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Missing => Ok(()),
        }
    }
}

/// A normalized notification
///
/// `id` is the key the item arrived under in its batch (object property or
/// array index), never a field of the item itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: Timestamp,
}

/// One payload delivered by a transport: keyed items in arrival order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    entries: Vec<(String, Value)>,
}

impl RawBatch {
    /// Parse a JSON batch body
    pub fn parse(text: &str) -> AppResult<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| AppError::MalformedBatch {
            context: "batch body is not valid JSON".to_string(),
            source: Some(Box::new(e)),
        })?;
        Self::from_value(value)
    }

    /// Build a batch from an already-decoded payload
    ///
    /// Objects keep their key order; arrays are keyed by index; `null` is an
    /// empty batch.
    pub fn from_value(value: Value) -> AppResult<Self> {
        let entries = match value {
            Value::Object(map) => map.into_iter().collect(),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| (index.to_string(), item))
                .collect(),
            Value::Null => Vec::new(),
            other => {
                return Err(AppError::malformed_batch(format!(
                    "expected an object of notifications, got {}",
                    value_kind(&other)
                )))
            }
        };
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(id, item)| (id.as_str(), item))
    }
}

impl IntoIterator for RawBatch {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

//! Field values flowing from article records and channel metadata into the
//! XML writer.
//!
//! Two layers exist:
//!
//! - [`FieldValue`] is what producers hand over. It may hold timestamps and
//!   nulls, which have no direct XML form.
//! - [`Value`] is the normalized shape the writer understands: a scalar
//!   string, a list of values, or an ordered map of named values.

use chrono::{DateTime, FixedOffset};

/// A record-level value, prior to normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Timestamp(DateTime<FixedOffset>),
    List(Vec<FieldValue>),
    Map(Vec<(String, FieldValue)>),
}

impl FieldValue {
    /// Short name of the variant, used in diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Text(_) => "text",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::List(_) => "list",
            FieldValue::Map(_) => "map",
        }
    }

    /// Looks up a key when this value is a map.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        match self {
            FieldValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<u32> for FieldValue {
    fn from(n: u32) -> Self {
        FieldValue::Text(n.to_string())
    }
}

impl From<u64> for FieldValue {
    fn from(n: u64) -> Self {
        FieldValue::Text(n.to_string())
    }
}

impl From<DateTime<FixedOffset>> for FieldValue {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        FieldValue::Timestamp(dt)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(values: Vec<T>) -> Self {
        FieldValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<toml::Value> for FieldValue {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => FieldValue::Text(s),
            toml::Value::Integer(i) => FieldValue::Text(i.to_string()),
            toml::Value::Float(f) => FieldValue::Text(f.to_string()),
            toml::Value::Boolean(b) => FieldValue::Text(b.to_string()),
            toml::Value::Datetime(dt) => {
                let raw = dt.to_string();
                // Local dates and times carry no offset and cannot become a timestamp
                match DateTime::parse_from_rfc3339(&raw) {
                    Ok(parsed) => FieldValue::Timestamp(parsed),
                    Err(_) => FieldValue::Text(raw),
                }
            }
            toml::Value::Array(items) => {
                FieldValue::List(items.into_iter().map(FieldValue::from).collect())
            }
            toml::Value::Table(table) => FieldValue::Map(
                table
                    .into_iter()
                    .map(|(k, v)| (k, FieldValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// A normalized value ready for XML output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(String),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
}

impl Value {
    /// The empty scalar, rendered as an element with no content.
    pub fn empty() -> Self {
        Value::Scalar(String::new())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(s.to_string())
    }
}

/// An ordered mapping of field names to values.
///
/// Used both for item records and for channel metadata. Field order is
/// insertion order and is what the feed reproduces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

/// Channel metadata is a plain record, read once by the exporter.
pub type ChannelMetadata = Record;

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a field. An existing field keeps its position; a new one is appended.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<toml::Table> for Record {
    fn from(table: toml::Table) -> Self {
        Self {
            fields: table
                .into_iter()
                .map(|(k, v)| (k, FieldValue::from(v)))
                .collect(),
        }
    }
}

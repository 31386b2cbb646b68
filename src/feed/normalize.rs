//! Field normalization: turns producer values into writer-ready [`Value`]s.

use chrono::{DateTime, FixedOffset};

use super::error::UnsupportedShape;
use super::value::{FieldValue, Record, Value};
use super::whitelist::{CHANNEL_IMAGE_ELEMENTS, CHANNEL_IMAGE_FALLBACKS};

/// RFC 2822 with a zero-padded day, e.g. `Tue, 01 Dec 2020 10:00:00 +0800`.
const RFC2822_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

pub fn format_timestamp(dt: &DateTime<FixedOffset>) -> String {
    dt.format(RFC2822_FORMAT).to_string()
}

/// Normalizes a value for output.
///
/// Timestamps become RFC 2822 strings and nulls become the empty scalar.
/// Lists and maps keep their structure and are normalized element-wise.
pub fn normalize(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::empty(),
        FieldValue::Text(s) => Value::Scalar(s.clone()),
        FieldValue::Timestamp(dt) => Value::Scalar(format_timestamp(dt)),
        FieldValue::List(items) => Value::List(items.iter().map(normalize).collect()),
        FieldValue::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), normalize(v)))
                .collect(),
        ),
    }
}

/// Extracts the publish time used to order items.
///
/// Accepts a timestamp, or text in RFC 3339 or RFC 2822 form.
pub fn sort_key(value: &FieldValue) -> Result<DateTime<FixedOffset>, String> {
    match value {
        FieldValue::Timestamp(dt) => Ok(*dt),
        FieldValue::Text(s) => DateTime::parse_from_rfc3339(s.trim())
            .or_else(|_| DateTime::parse_from_rfc2822(s.trim()))
            .map_err(|_| format!("unparseable timestamp {s:?}")),
        FieldValue::Null => Err("value is null".to_string()),
        other => Err(format!("expected a timestamp, got {}", other.shape())),
    }
}

/// Collapses an item category list to the name of its first entry.
///
/// Only the first category survives; the rest are dropped.
pub fn flatten_category(value: &FieldValue) -> Result<Value, UnsupportedShape> {
    let unsupported = |found| UnsupportedShape {
        field: "category",
        expected: "non-empty list",
        found,
    };

    let FieldValue::List(categories) = value else {
        return Err(unsupported(value.shape()));
    };
    match categories.first() {
        Some(first @ FieldValue::Map(_)) => Ok(first.get("name").map_or_else(Value::empty, normalize)),
        Some(FieldValue::Text(name)) => Ok(Value::Scalar(name.clone())),
        Some(other) => Err(unsupported(other.shape())),
        None => Err(unsupported("empty list")),
    }
}

/// Builds the attribute list of an `<enclosure>` from its sub-object.
///
/// Entries without a non-empty scalar value are left out. A null enclosure
/// yields no attributes.
pub fn enclosure_attributes(value: &FieldValue) -> Result<Vec<(String, String)>, UnsupportedShape> {
    match value {
        FieldValue::Null => Ok(Vec::new()),
        FieldValue::Map(entries) => Ok(entries
            .iter()
            .filter_map(|(name, v)| match normalize(v) {
                Value::Scalar(s) if !s.is_empty() => Some((name.clone(), s)),
                _ => None,
            })
            .collect()),
        other => Err(UnsupportedShape {
            field: "enclosure",
            expected: "map",
            found: other.shape(),
        }),
    }
}

/// Resolves the channel `<image>` sub-elements.
///
/// An image map supplies sub-fields directly and a bare string is taken as
/// the image URL. `title`, `link` and `description` fall back to the channel
/// fields of the same name. Sub-fields that resolve to nothing are omitted.
pub fn resolve_channel_image(channel: &Record) -> Value {
    let image = channel.get("image");
    if let Some(other @ (FieldValue::List(_) | FieldValue::Timestamp(_))) = image {
        tracing::debug!(shape = other.shape(), "Ignoring channel image of unsupported shape");
    }

    let entries = CHANNEL_IMAGE_ELEMENTS
        .iter()
        .filter_map(|&field| {
            let explicit = match image {
                Some(map @ FieldValue::Map(_)) => map.get(field),
                Some(url @ FieldValue::Text(_)) if field == "url" => Some(url),
                _ => None,
            };
            let resolved = explicit.filter(|v| !is_blank(v)).or_else(|| {
                CHANNEL_IMAGE_FALLBACKS
                    .contains(&field)
                    .then(|| channel.get(field))
                    .flatten()
                    .filter(|v| !is_blank(v))
            })?;
            Some((field.to_string(), normalize(resolved)))
        })
        .collect();

    Value::Map(entries)
}

fn is_blank(value: &FieldValue) -> bool {
    match value {
        FieldValue::Null => true,
        FieldValue::Text(s) => s.is_empty(),
        _ => false,
    }
}

//! # Change Event Codec
//!
//! Decodes the row body a trigger posts to the ingestion endpoint and
//! encodes the message delivered to subscribers.
//!
//! Two body encodings are accepted:
//!
//! - **JSON object** (what the generated triggers send): every member becomes
//!   one column. Strings are kept as-is, `null` becomes `"NULL"`, other values
//!   keep their JSON text. A JSON body that does not parse rejects the event.
//! - **Legacy text** (`col1: val1, col2: val2`): segments that do not split
//!   into exactly one name and one value are skipped and reported in
//!   [`DecodedColumns::skipped`]. The rest of the event is still delivered.

use serde_json::{Map, Value};

use super::errors::{RealtimeError, RealtimeResult};
use super::event::Columns;

/// Text rendered for SQL NULL values
pub const NULL_TEXT: &str = "NULL";

/// Decoded row body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedColumns {
    /// Columns that decoded cleanly
    pub columns: Columns,

    /// Legacy segments dropped because they were not `name: value`
    pub skipped: Vec<String>,
}

/// Decode a raw ingestion body into columns
pub fn decode_columns(body: &[u8]) -> RealtimeResult<DecodedColumns> {
    let text = std::str::from_utf8(body)
        .map_err(|e| RealtimeError::MalformedEvent(format!("body is not UTF-8: {}", e)))?;

    if text.trim_start().starts_with('{') {
        decode_json(text)
    } else {
        Ok(decode_legacy(text))
    }
}

fn decode_json(text: &str) -> RealtimeResult<DecodedColumns> {
    let object: Map<String, Value> = serde_json::from_str(text)
        .map_err(|e| RealtimeError::MalformedEvent(format!("invalid JSON row: {}", e)))?;

    let columns = object
        .into_iter()
        .map(|(name, value)| (name, value_as_text(value)))
        .collect();

    Ok(DecodedColumns {
        columns,
        skipped: Vec::new(),
    })
}

fn value_as_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => NULL_TEXT.to_string(),
        other => other.to_string(),
    }
}

fn decode_legacy(text: &str) -> DecodedColumns {
    let mut decoded = DecodedColumns::default();

    for segment in text.split(',') {
        if segment.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = segment.split(": ").collect();
        match parts.as_slice() {
            [name, value] if !name.trim().is_empty() => {
                decoded
                    .columns
                    .insert(name.trim().to_string(), value.trim().to_string());
            }
            _ => decoded.skipped.push(segment.trim().to_string()),
        }
    }

    decoded
}

/// Serialize columns into the JSON message sent to subscribers
pub fn encode_columns(columns: &Columns) -> RealtimeResult<String> {
    serde_json::to_string(columns).map_err(|e| RealtimeError::Serialization(e.to_string()))
}

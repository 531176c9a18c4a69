//! JSON document codec.
//!
//! Converts [`Value`]s and [`Record`]s to and from `serde_json` documents.
//! JSON loses some type information (timestamps become RFC 3339 strings,
//! bytes become arrays of numbers), so decoding takes the expected
//! [`ValueKind`] when the caller knows it.

use crate::error::{CodecError, CodecResult};
use crate::record::Record;
use crate::value::{Value, ValueKind};
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Number};

/// Encodes a value as JSON.
///
/// Non-finite floats have no JSON form and encode as `null`.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(n) => serde_json::Value::Number((*n).into()),
        Value::Float(x) => Number::from_f64(*x).map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => serde_json::Value::Array(
            b.iter()
                .map(|byte| serde_json::Value::Number((*byte).into()))
                .collect(),
        ),
        Value::Json(j) => j.clone(),
        Value::Timestamp(t) => serde_json::Value::String(t.to_rfc3339()),
    }
}

/// Decodes a JSON value without a type hint.
///
/// Integral numbers become [`Value::Integer`], other numbers
/// [`Value::Float`], strings [`Value::Text`]; arrays and objects are kept as
/// [`Value::Json`].
pub fn infer_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map_or(Value::Null, Value::Float),
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Json(other.clone()),
    }
}

/// Decodes a JSON value into the expected kind.
///
/// `null` always decodes to [`Value::Null`]; nullability is checked by the
/// metadata layer, not here.
pub fn from_json(json: &serde_json::Value, kind: ValueKind) -> CodecResult<Value> {
    if json.is_null() {
        return Ok(Value::Null);
    }
    let decoded = match kind {
        ValueKind::Null => None,
        ValueKind::Bool => json.as_bool().map(Value::Bool),
        ValueKind::Integer => json.as_i64().map(Value::Integer),
        ValueKind::Float => json.as_f64().map(Value::Float),
        ValueKind::Text => json.as_str().map(|s| Value::Text(s.to_string())),
        ValueKind::Bytes => json.as_array().and_then(|items| {
            items
                .iter()
                .map(|item| item.as_u64().and_then(|n| u8::try_from(n).ok()))
                .collect::<Option<Vec<u8>>>()
                .map(Value::Bytes)
        }),
        ValueKind::Json => Some(Value::Json(json.clone())),
        ValueKind::Timestamp => json
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| Value::Timestamp(t.with_timezone(&Utc))),
    };
    decoded.ok_or_else(|| {
        CodecError::decoding_failed(format!("cannot decode {json} as {kind}"))
    })
}

/// Encodes a record as a JSON object.
pub fn record_to_json(record: &Record) -> Map<String, serde_json::Value> {
    record
        .iter()
        .map(|(field, value)| (field.clone(), to_json(value)))
        .collect()
}

/// Decodes a JSON object into a record.
///
/// `kind_of` supplies the expected kind per field; fields it does not know
/// are decoded with [`infer_json`].
pub fn record_from_json<F>(object: &Map<String, serde_json::Value>, kind_of: F) -> CodecResult<Record>
where
    F: Fn(&str) -> Option<ValueKind>,
{
    let mut record = Record::new();
    for (field, json) in object {
        let value = match kind_of(field) {
            Some(kind) => from_json(json, kind).map_err(|e| match e {
                CodecError::DecodingFailed { message } => {
                    CodecError::decoding_failed(format!("field {field}: {message}"))
                }
                other => other,
            })?,
            None => infer_json(json),
        };
        record.insert(field.clone(), value);
    }
    Ok(record)
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        to_json(self).serialize(serializer)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        record_to_json(self).serialize(serializer)
    }
}

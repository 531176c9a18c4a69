//! Field-keyed records.

use crate::error::{CodecError, CodecResult};
use crate::value::{Value, ValueKind};
use chrono::{DateTime, Utc};
use std::collections::btree_map::{self, BTreeMap};

/// A map from field name to [`Value`].
///
/// Records are the shape in which backends store entities and in which
/// partial updates are expressed. Fields iterate in key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, builder style.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Sets a field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Removes a field.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Returns a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns true if the field is present (even when null).
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(field, value)` pairs in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    /// Iterates over field names in key order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Overwrites the fields present in `patch`, leaving the rest untouched.
    pub fn apply(&mut self, patch: &Record) {
        for (field, value) in patch.iter() {
            self.fields.insert(field.clone(), value.clone());
        }
    }

    /// Returns true if every field of `partial` is present here with the
    /// same value. Numbers compare by value across integer and float.
    pub fn contains_all(&self, partial: &Record) -> bool {
        partial.iter().all(|(field, value)| {
            self.fields
                .get(field)
                .is_some_and(|stored| stored.same_value(value))
        })
    }

    /// Returns a required field.
    pub fn require(&self, field: &str) -> CodecResult<&Value> {
        self.fields
            .get(field)
            .ok_or_else(|| CodecError::missing_field(field))
    }

    /// Reads a required text field.
    pub fn text(&self, field: &str) -> CodecResult<String> {
        match self.require(field)? {
            Value::Text(s) => Ok(s.clone()),
            other => Err(mismatch(field, ValueKind::Text, other)),
        }
    }

    /// Reads an optional text field. Absent and null both yield `None`.
    pub fn opt_text(&self, field: &str) -> CodecResult<Option<String>> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Text(s)) => Ok(Some(s.clone())),
            Some(other) => Err(mismatch(field, ValueKind::Text, other)),
        }
    }

    /// Reads a required integer field.
    pub fn integer(&self, field: &str) -> CodecResult<i64> {
        match self.require(field)? {
            Value::Integer(n) => Ok(*n),
            other => Err(mismatch(field, ValueKind::Integer, other)),
        }
    }

    /// Reads an optional integer field.
    pub fn opt_integer(&self, field: &str) -> CodecResult<Option<i64>> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Integer(n)) => Ok(Some(*n)),
            Some(other) => Err(mismatch(field, ValueKind::Integer, other)),
        }
    }

    /// Reads a required numeric field as `f64`.
    pub fn float(&self, field: &str) -> CodecResult<f64> {
        let value = self.require(field)?;
        value
            .as_number()
            .ok_or_else(|| mismatch(field, ValueKind::Float, value))
    }

    /// Reads a required boolean field.
    pub fn boolean(&self, field: &str) -> CodecResult<bool> {
        match self.require(field)? {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch(field, ValueKind::Bool, other)),
        }
    }

    /// Reads a required byte field.
    pub fn bytes(&self, field: &str) -> CodecResult<Vec<u8>> {
        match self.require(field)? {
            Value::Bytes(b) => Ok(b.clone()),
            other => Err(mismatch(field, ValueKind::Bytes, other)),
        }
    }

    /// Reads a required JSON field.
    pub fn json(&self, field: &str) -> CodecResult<serde_json::Value> {
        match self.require(field)? {
            Value::Json(j) => Ok(j.clone()),
            other => Err(mismatch(field, ValueKind::Json, other)),
        }
    }

    /// Reads a required timestamp field.
    pub fn timestamp(&self, field: &str) -> CodecResult<DateTime<Utc>> {
        match self.require(field)? {
            Value::Timestamp(t) => Ok(*t),
            other => Err(mismatch(field, ValueKind::Timestamp, other)),
        }
    }
}

fn mismatch(field: &str, expected: ValueKind, found: &Value) -> CodecError {
    CodecError::type_mismatch(field, expected.name(), found.kind().name())
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_readers() {
        let record = Record::new()
            .with("name", "Alice")
            .with("age", 30i64)
            .with("score", 9.5)
            .with("active", true)
            .with("nickname", None::<String>);

        assert_eq!(record.text("name").unwrap(), "Alice");
        assert_eq!(record.integer("age").unwrap(), 30);
        assert_eq!(record.float("score").unwrap(), 9.5);
        assert_eq!(record.float("age").unwrap(), 30.0);
        assert!(record.boolean("active").unwrap());
        assert_eq!(record.opt_text("nickname").unwrap(), None);
        assert_eq!(record.opt_text("missing").unwrap(), None);
    }

    #[test]
    fn missing_and_mismatched_fields() {
        let record = Record::new().with("age", "thirty");

        assert_eq!(
            record.text("name"),
            Err(CodecError::missing_field("name"))
        );
        assert!(matches!(
            record.integer("age"),
            Err(CodecError::TypeMismatch { expected: "integer", found: "text", .. })
        ));
    }

    #[test]
    fn apply_overwrites_only_patched_fields() {
        let mut record = Record::new().with("name", "Bob").with("age", 30i64);
        record.apply(&Record::new().with("name", "Bobi"));

        assert_eq!(record.text("name").unwrap(), "Bobi");
        assert_eq!(record.integer("age").unwrap(), 30);
    }

    #[test]
    fn contains_all_requires_every_field() {
        let record = Record::new().with("name", "Bob").with("age", 30i64);

        assert!(record.contains_all(&Record::new().with("name", "Bob")));
        assert!(record.contains_all(&Record::new()));
        assert!(!record.contains_all(&Record::new().with("name", "Bob").with("age", 31i64)));
    }

    #[test]
    fn contains_all_compares_numbers_by_value() {
        let record = Record::new().with("score", 3i64).with("ratio", 0.5);

        assert!(record.contains_all(&Record::new().with("score", 3.0)));
        assert!(record.contains_all(&Record::new().with("ratio", 0.5)));
        assert!(!record.contains_all(&Record::new().with("score", 3.5)));
        assert!(!record.contains_all(&Record::new().with("score", "3")));
    }

    #[test]
    fn keys_iterate_sorted() {
        let record: Record = vec![("b", 1i64), ("a", 2i64)].into_iter().collect();
        let keys: Vec<_> = record.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}

//! Schema codec boundary.
//!
//! Messages on the log are opaque bytes encoded against a per-stream schema.
//! The rest of the crate only sees a [`Record`]: a decoded mapping of field
//! names to values with typed accessors, so missing or mistyped fields surface
//! as [`FieldError`]s instead of panics.
//!
//! Implementations:
//! - [`JsonCodec`]: JSON objects, with an optional set of required fields

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

mod json;

pub use json::JsonCodec;

/// Errors produced when bytes do not decode against the stream schema.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    Syntax(String),

    #[error("Payload is not a record (found {found})")]
    NotARecord { found: &'static str },

    #[error("Schema '{schema}' requires field '{field}'")]
    MissingField { schema: String, field: String },
}

/// Errors produced when a record cannot be encoded.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Schema '{schema}' requires field '{field}'")]
    MissingField { schema: String, field: String },

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// A field lookup on a [`Record`] that did not find what it expected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("missing field '{0}'")]
    Missing(String),

    #[error("field '{field}' should be {expected}, found {found}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Pure conversion between wire bytes and [`Record`]s for one schema.
pub trait Codec: Send + Sync {
    /// Schema name, used in logs and errors.
    fn schema(&self) -> &str;

    fn decode(&self, bytes: &[u8]) -> Result<Record, DecodeError>;

    fn encode(&self, record: &Record) -> Result<Vec<u8>, EncodeError>;
}

/// A decoded message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Build a record from a JSON object value. Returns `None` for any other
    /// value kind.
    pub fn from_object(value: &Value) -> Option<Self> {
        value.as_object().map(|fields| Self {
            fields: fields.clone(),
        })
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn get_str(&self, field: &str) -> Result<&str, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::Missing(field.to_string())),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(wrong_type(field, "a string", other)),
        }
    }

    /// Like [`get_str`](Self::get_str) but treats an absent or null field as
    /// `None`.
    pub fn get_opt_str(&self, field: &str) -> Result<Option<&str>, FieldError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(wrong_type(field, "a string", other)),
        }
    }

    pub fn get_i64(&self, field: &str) -> Result<i64, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::Missing(field.to_string())),
            Some(value) => value
                .as_i64()
                .ok_or_else(|| wrong_type(field, "an integer", value)),
        }
    }

    /// Array field; absent or null yields `None`.
    pub fn get_list(&self, field: &str) -> Result<Option<&[Value]>, FieldError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(other) => Err(wrong_type(field, "a list", other)),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

fn wrong_type(field: &str, expected: &'static str, found: &Value) -> FieldError {
    FieldError::WrongType {
        field: field.to_string(),
        expected,
        found: kind_of(found),
    }
}

/// Human-readable kind of a JSON value.
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

/// Codecs keyed by stream name.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, stream: impl Into<String>, codec: Arc<dyn Codec>) {
        self.codecs.insert(stream.into(), codec);
    }

    pub fn with(mut self, stream: impl Into<String>, codec: Arc<dyn Codec>) -> Self {
        self.register(stream, codec);
        self
    }

    pub fn get(&self, stream: &str) -> Option<Arc<dyn Codec>> {
        self.codecs.get(stream).cloned()
    }

    pub fn streams(&self) -> impl Iterator<Item = &str> {
        self.codecs.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut streams: Vec<_> = self.codecs.keys().collect();
        streams.sort();
        f.debug_struct("CodecRegistry")
            .field("streams", &streams)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_str_missing_and_wrong_type() {
        let record = Record::new().with("id", "x1").with("uts", 17);

        assert_eq!(record.get_str("id"), Ok("x1"));
        assert_eq!(
            record.get_str("name"),
            Err(FieldError::Missing("name".to_string()))
        );
        assert!(matches!(
            record.get_str("uts"),
            Err(FieldError::WrongType { found: "a number", .. })
        ));
    }

    #[test]
    fn test_get_opt_str_treats_null_as_absent() {
        let record = Record::new().with("field", Value::Null);
        assert_eq!(record.get_opt_str("field"), Ok(None));
        assert_eq!(record.get_opt_str("other"), Ok(None));
    }

    #[test]
    fn test_get_list() {
        let record = Record::new()
            .with("commands", json!([{"group": "LIST"}]))
            .with("tags", "kenmo");

        assert_eq!(record.get_list("commands").unwrap().map(|l| l.len()), Some(1));
        assert_eq!(record.get_list("missing"), Ok(None));
        assert!(record.get_list("tags").is_err());
    }

    #[test]
    fn test_get_i64() {
        let record = Record::new().with("uts", 1_560_000_000i64).with("id", "a");
        assert_eq!(record.get_i64("uts"), Ok(1_560_000_000));
        assert!(record.get_i64("id").is_err());
    }

    #[test]
    fn test_from_object_rejects_non_objects() {
        assert!(Record::from_object(&json!({"a": 1})).is_some());
        assert!(Record::from_object(&json!([1, 2])).is_none());
    }

    #[test]
    fn test_registry_lookup() {
        let registry =
            CodecRegistry::new().with("subjects", Arc::new(JsonCodec::new("subject")));
        assert!(registry.get("subjects").is_some());
        assert!(registry.get("comments").is_none());
    }
}

//! JSON codec.
//!
//! Each message is one JSON object. A list of required top-level fields stands
//! in for the schema: decoding or encoding a record without them fails.

use serde_json::Value;

use super::{kind_of, Codec, DecodeError, EncodeError, Record};

#[derive(Debug, Clone)]
pub struct JsonCodec {
    schema: String,
    required: Vec<String>,
}

impl JsonCodec {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            required: Vec::new(),
        }
    }

    /// Require the given top-level fields on every record.
    pub fn with_required<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = fields.into_iter().map(Into::into).collect();
        self
    }

    fn missing_field(&self, record: &Record) -> Option<&str> {
        self.required
            .iter()
            .find(|field| !record.contains(field))
            .map(String::as_str)
    }
}

impl Codec for JsonCodec {
    fn schema(&self) -> &str {
        &self.schema
    }

    fn decode(&self, bytes: &[u8]) -> Result<Record, DecodeError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| DecodeError::Syntax(e.to_string()))?;
        let record = match value {
            Value::Object(fields) => Record::from_map(fields),
            other => {
                return Err(DecodeError::NotARecord {
                    found: kind_of(&other),
                })
            }
        };
        if let Some(field) = self.missing_field(&record) {
            return Err(DecodeError::MissingField {
                schema: self.schema.clone(),
                field: field.to_string(),
            });
        }
        Ok(record)
    }

    fn encode(&self, record: &Record) -> Result<Vec<u8>, EncodeError> {
        if let Some(field) = self.missing_field(record) {
            return Err(EncodeError::MissingField {
                schema: self.schema.clone(),
                field: field.to_string(),
            });
        }
        serde_json::to_vec(record.as_map()).map_err(|e| EncodeError::Serialization(e.to_string()))
    }
}

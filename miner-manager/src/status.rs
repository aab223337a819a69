//! Typed lookups over a device's raw status document.

use miner_manager_common::FieldValue;
use serde_json::{Map, Value};

/// A decoded `/api/system/info` document.
///
/// Device firmware decides which keys are present and what type each has,
/// so every accessor returns `None` rather than failing on a mismatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStatus {
    fields: Map<String, Value>,
}

impl RawStatus {
    /// Wrap a JSON object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Accept a JSON value only if it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self::new(fields)),
            _ => None,
        }
    }

    /// Raw value for `key`, whatever its type.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Numeric value for `key`; strings, booleans and containers are ignored.
    pub fn get_number(&self, key: &str) -> Option<FieldValue> {
        self.get(key).and_then(FieldValue::from_json)
    }

    /// String value for `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// List value for `key`.
    pub fn get_list(&self, key: &str) -> Option<&[Value]> {
        self.get(key).and_then(Value::as_array).map(Vec::as_slice)
    }

    /// Text for a tag: non-empty strings, numbers other than zero rendered
    /// as written, and `true` as `True`. Everything else counts as absent.
    pub fn get_tag(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
            Value::Bool(true) => Some("True".to_string()),
            _ => None,
        }
    }
}

//! Influx Line Protocol model.
//!
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=val1,field2=val2 timestamp_ns
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

/// A numeric value carried in a line-protocol field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// 64-bit signed integer, written with an `i` suffix.
    Integer(i64),
    /// 64-bit float, written in plain decimal form.
    Float(f64),
}

impl FieldValue {
    /// Convert a JSON value into a field value.
    ///
    /// Only JSON numbers qualify. Integers outside the `i64` range and
    /// non-finite floats yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        let Value::Number(n) = value else {
            return None;
        };

        if let Some(i) = n.as_i64() {
            Some(FieldValue::Integer(i))
        } else if n.is_f64() {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(FieldValue::Float)
        } else {
            None
        }
    }

    /// Format this value for Line Protocol.
    ///
    /// - Integer: suffixed with `i` (e.g. `42i`)
    /// - Float: always carries a fraction or exponent (e.g. `450.2`, `3490000000.0`)
    pub fn to_line_protocol(&self) -> String {
        match self {
            FieldValue::Integer(v) => format!("{}i", v),
            FieldValue::Float(v) => {
                let s = format!("{}", v);
                if v.is_finite() && !s.contains(['.', 'e', 'E']) {
                    format!("{}.0", s)
                } else {
                    s
                }
            }
        }
    }
}

/// One line of output: a measurement with its tags, fields and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub measurement: String,
    /// Tag pairs in emission order (unescaped).
    pub tags: Vec<(String, String)>,
    /// Field pairs in emission order (names unescaped).
    pub fields: Vec<(String, FieldValue)>,
    /// Nanoseconds since Unix epoch.
    pub timestamp_ns: u64,
}

impl Record {
    /// Build a record, returning `None` when there are no fields.
    ///
    /// A line without fields is not valid line protocol, so the whole record
    /// is suppressed instead.
    pub fn new(
        measurement: impl Into<String>,
        tags: Vec<(String, String)>,
        fields: Vec<(String, FieldValue)>,
        timestamp_ns: u64,
    ) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }

        Some(Self {
            measurement: measurement.into(),
            tags,
            fields,
            timestamp_ns,
        })
    }

    /// The escaped `key=value` tag list, comma-joined.
    pub fn tag_set(&self) -> String {
        self.tags
            .iter()
            .map(|(k, v)| format!("{}={}", escape(k), escape(v)))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// The escaped `key=value` field list, comma-joined.
    pub fn field_set(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", escape(k), v.to_line_protocol()))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Render the record as a single line (no trailing newline).
    pub fn to_line(&self) -> String {
        let mut line = escape_measurement(&self.measurement);

        let tags = self.tag_set();
        if !tags.is_empty() {
            line.push(',');
            line.push_str(&tags);
        }

        line.push(' ');
        line.push_str(&self.field_set());
        line.push(' ');
        line.push_str(&self.timestamp_ns.to_string());
        line
    }
}

/// Escape a tag key, tag value or field key.
///
/// Commas, equals signs and spaces are prefixed with a backslash.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, ',' | '=' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a measurement name (commas and spaces only).
fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

/// Get the current timestamp in nanoseconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch.
pub fn current_timestamp_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

//! Transport-neutral metric points
//!
//! A [`MetricPoint`] is a named set of tags and scalar fields. The timestamp
//! is implicit: the backend stamps the point when it receives it.
//!
//! Tags and fields are stored as given, including `None` values, so the
//! point can be inspected in tests. The [`MetricPoint::tags`] and
//! [`MetricPoint::fields`] iterators yield only what is transmitted:
//! `None` values, empty tag values and non-finite floats are skipped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Scalar field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
    String(String),
}

impl FieldValue {
    /// Whether the line protocol can carry this value
    pub fn is_representable(&self) -> bool {
        match self {
            FieldValue::Float(f) => f.is_finite(),
            _ => true,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Boolean(v) => write!(f, "{}", v),
            FieldValue::String(v) => f.write_str(v),
        }
    }
}

/// A named, tagged set of scalar fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    measurement: String,
    tags: BTreeMap<String, Option<String>>,
    fields: BTreeMap<String, Option<FieldValue>>,
}

impl MetricPoint {
    /// Create an empty point for a measurement
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a tag
    pub fn tag(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tag_opt(key, Some(value))
    }

    /// Add a tag that may be absent
    pub fn tag_opt<V: Into<String>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.tags.insert(key.into(), value.map(Into::into));
        self
    }

    /// Add a field
    pub fn field(self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.field_opt(key, Some(value))
    }

    /// Add a field that may be absent
    pub fn field_opt<V: Into<FieldValue>>(
        mut self,
        key: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        self.fields.insert(key.into(), value.map(Into::into));
        self
    }

    /// Measurement name
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// Tags that will be transmitted, sorted by key
    pub fn tags(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.tags.iter().filter_map(|(k, v)| match v.as_deref() {
            Some(v) if !v.is_empty() => Some((k.as_str(), v)),
            _ => None,
        })
    }

    /// Fields that will be transmitted, sorted by key
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> + '_ {
        self.fields.iter().filter_map(|(k, v)| match v {
            Some(v) if v.is_representable() => Some((k.as_str(), v)),
            _ => None,
        })
    }

    /// Transmitted value of a tag
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Transmitted value of a field
    pub fn field_value(&self, key: &str) -> Option<&FieldValue> {
        self.fields().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Whether at least one field survives filtering
    pub fn has_fields(&self) -> bool {
        self.fields().next().is_some()
    }
}

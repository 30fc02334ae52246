//! Canonical value representation shared by filters, parameter maps and
//! records returned from the store.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::QueryError;

/// Loosely typed value as it appears in request filters, bound parameters and
/// raw store records.
///
/// Serialized untagged so parameter maps and records use the same shape the
/// store speaks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null literal.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed 64-bit integer literal.
    Int(i64),
    /// 64-bit floating point literal.
    Float(f64),
    /// UTF-8 string literal. Record links arrive as `#cluster:position` strings.
    String(String),
    /// Ordered list (embedded lists, link sets, `IN` operands).
    List(Vec<Value>),
    /// Embedded document or an expanded linked record.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Interprets the value as a record link.
    ///
    /// Accepts both a bare `#c:p` string and an expanded record carrying `@rid`.
    pub fn as_record_id(&self) -> Option<RecordId> {
        match self {
            Value::String(s) => s.parse().ok(),
            Value::Map(map) => map.get("@rid").and_then(Value::as_record_id),
            _ => None,
        }
    }

    /// Like [`Value::as_record_id`] but also accepts the temporary negative
    /// ids the store hands out for projected rows.
    pub fn as_stored_record_id(&self) -> Option<RecordId> {
        match self {
            Value::String(s) => RecordId::parse_stored(s).ok(),
            Value::Map(map) => map.get("@rid").and_then(Value::as_stored_record_id),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<RecordId> for Value {
    fn from(value: RecordId) -> Self {
        Value::String(value.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

/// Store identity handle (`#cluster:position`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    /// Cluster the record lives in. Negative for temporary ids.
    pub cluster: i32,
    /// Position within the cluster.
    pub position: i64,
}

impl RecordId {
    /// Creates a record id from its parts.
    pub fn new(cluster: i32, position: i64) -> Self {
        Self { cluster, position }
    }

    /// Parses an id returned by the store, where either part may be negative.
    ///
    /// Request targets go through [`FromStr`] instead, which only accepts
    /// persistent `#cluster:position` ids.
    pub fn parse_stored(input: &str) -> Result<Self, QueryError> {
        let signed = |s: &str| {
            let digits = s.strip_prefix('-').unwrap_or(s);
            !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
        };
        Self::parse_with(input, signed)
    }

    fn parse_with(input: &str, part_ok: impl Fn(&str) -> bool) -> Result<Self, QueryError> {
        let invalid = || QueryError::attribute(format!("invalid record id ({input})"));
        let body = input.trim().strip_prefix('#').ok_or_else(invalid)?;
        let (cluster, position) = body.split_once(':').ok_or_else(invalid)?;
        if !part_ok(cluster) || !part_ok(position) {
            return Err(invalid());
        }
        Ok(RecordId {
            cluster: cluster.parse().map_err(|_| invalid())?,
            position: position.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.cluster, self.position)
    }
}

impl FromStr for RecordId {
    type Err = QueryError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse_with(input, |s| {
            !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
        })
    }
}

impl Serialize for RecordId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        RecordId::parse_stored(&raw).map_err(serde::de::Error::custom)
    }
}

//! Records returned by the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::query::value::{RecordId, Value};

/// Identity envelope plus an open property map.
///
/// Aggregate rows (counts) carry no identity; every envelope field is then
/// `None`. Edge endpoints stay as raw values since the store returns either a
/// record id or the expanded endpoint record depending on the projection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record id.
    #[serde(rename = "@rid", default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<RecordId>,
    /// Class of the record.
    #[serde(rename = "@class", default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Soft-delete timestamp.
    #[serde(rename = "deletedAt", default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<Value>,
    /// Source endpoint of an edge.
    #[serde(rename = "out", default, skip_serializing_if = "Option::is_none")]
    pub out: Option<Value>,
    /// Target endpoint of an edge.
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub in_: Option<Value>,
    /// Every other property.
    #[serde(flatten)]
    pub properties: BTreeMap<String, Value>,
}

impl Record {
    /// Empty record of `class` with id `rid`.
    pub fn new(rid: RecordId, class: impl Into<String>) -> Self {
        Self {
            rid: Some(rid),
            class: Some(class.into()),
            ..Self::default()
        }
    }

    /// Adds a property.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Property value; `None` for absent properties.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// The stored `name` property.
    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }

    /// Record id held by a link property, whether stored as an id or as an
    /// expanded record.
    pub fn link(&self, name: &str) -> Option<RecordId> {
        self.get(name).and_then(Value::as_stored_record_id)
    }

    /// True when the soft-delete timestamp is set.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.as_ref().is_some_and(|value| !value.is_null())
    }

    /// Rebuilds a record from an expanded nested map.
    pub fn from_map(map: &BTreeMap<String, Value>) -> Self {
        let mut properties = map.clone();
        let rid = properties.remove("@rid").and_then(|v| v.as_stored_record_id());
        let class = properties
            .remove("@class")
            .and_then(|v| v.as_str().map(str::to_owned));
        let deleted_at = properties.remove("deletedAt").filter(|v| !v.is_null());
        let out = properties.remove("out");
        let in_ = properties.remove("in");
        Self {
            rid,
            class,
            deleted_at,
            out,
            in_,
            properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_fields_are_split_from_properties() {
        let record: Record = serde_json::from_value(json!({
            "@rid": "#12:3",
            "@class": "Disease",
            "deletedAt": null,
            "name": "cancer",
            "source": "#40:1"
        }))
        .expect("valid record");
        assert_eq!(record.rid, Some(RecordId::new(12, 3)));
        assert_eq!(record.class.as_deref(), Some("Disease"));
        assert!(!record.is_deleted());
        assert_eq!(record.name(), Some("cancer"));
        assert_eq!(record.link("source"), Some(RecordId::new(40, 1)));
        assert!(!record.properties.contains_key("@rid"));
    }

    #[test]
    fn projected_rows_keep_temporary_ids() {
        let record: Record = serde_json::from_value(json!({"@rid": "#-2:0", "name": "kras"}))
            .expect("temporary rid is accepted");
        assert_eq!(record.rid, Some(RecordId::new(-2, 0)));
        assert_eq!(record.name(), Some("kras"));
    }

    #[test]
    fn aggregate_rows_have_no_identity() {
        let row: Record = serde_json::from_value(json!({"cnt": 12})).expect("valid row");
        assert!(row.rid.is_none());
        assert_eq!(row.get("cnt"), Some(&Value::Int(12)));
    }
}

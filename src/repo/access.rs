//! Visibility trimming of selected records.

use std::collections::{BTreeMap, BTreeSet};

use crate::query::value::Value;
use crate::repo::record::Record;

/// Decides whether a user may read a record.
pub trait AccessPolicy: Send + Sync {
    /// True when `user` may see `record`.
    fn is_visible(&self, user: &Record, record: &Record) -> bool;
}

/// The user a selection runs on behalf of, with the policy to check them by.
#[derive(Clone, Copy)]
pub struct Viewer<'a> {
    /// User record, with its groups expanded.
    pub user: &'a Record,
    /// Policy deciding visibility.
    pub policy: &'a dyn AccessPolicy,
}

impl std::fmt::Debug for Viewer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer").field("user", &self.user.rid).finish_non_exhaustive()
    }
}

/// Grants read access per group: a user sees a record when any of their
/// groups lists the record's class, or `*`.
///
/// The user's groups are read from its `groups` property, either as names or
/// as expanded group records carrying `name`. Records without a class
/// (aggregate rows) are always visible.
#[derive(Clone, Debug, Default)]
pub struct ClassReadPolicy {
    readable: BTreeMap<String, BTreeSet<String>>,
}

impl ClassReadPolicy {
    /// Policy granting nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets members of `group` read `classes`.
    pub fn grant<I, S>(mut self, group: impl Into<String>, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.readable
            .entry(group.into())
            .or_default()
            .extend(classes.into_iter().map(Into::into));
        self
    }

    fn group_names(user: &Record) -> Vec<&str> {
        match user.get("groups") {
            Some(Value::List(groups)) => groups
                .iter()
                .filter_map(|group| match group {
                    Value::String(name) => Some(name.as_str()),
                    Value::Map(map) => map.get("name").and_then(Value::as_str),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl AccessPolicy for ClassReadPolicy {
    fn is_visible(&self, user: &Record, record: &Record) -> bool {
        let Some(class) = record.class.as_deref() else {
            return true;
        };
        Self::group_names(user).into_iter().any(|group| {
            self.readable
                .get(group)
                .is_some_and(|classes| classes.contains(class) || classes.contains("*"))
        })
    }
}

/// Drops records the viewer may not see and, unless `history`, soft-deleted
/// records. Expanded linked records nested in properties are trimmed the same
/// way. Only the in-memory result changes.
pub fn trim_records(
    records: Vec<Record>,
    history: bool,
    viewer: Option<Viewer<'_>>,
) -> Vec<Record> {
    records
        .into_iter()
        .filter(|record| keep(record, history, viewer))
        .map(|mut record| {
            trim_properties(&mut record.properties, history, viewer);
            record
        })
        .collect()
}

fn keep(record: &Record, history: bool, viewer: Option<Viewer<'_>>) -> bool {
    if !history && record.is_deleted() {
        return false;
    }
    viewer.map_or(true, |viewer| viewer.policy.is_visible(viewer.user, record))
}

fn trim_properties(
    properties: &mut BTreeMap<String, Value>,
    history: bool,
    viewer: Option<Viewer<'_>>,
) {
    properties.retain(|_, value| trim_value(value, history, viewer));
}

/// Trims `value` in place; false when the value itself must be dropped.
fn trim_value(value: &mut Value, history: bool, viewer: Option<Viewer<'_>>) -> bool {
    match value {
        Value::Map(map) if is_record(map) => {
            if !keep(&Record::from_map(map), history, viewer) {
                return false;
            }
            trim_properties(map, history, viewer);
            true
        }
        Value::Map(map) => {
            trim_properties(map, history, viewer);
            true
        }
        Value::List(items) => {
            items.retain_mut(|item| trim_value(item, history, viewer));
            true
        }
        _ => true,
    }
}

fn is_record(map: &BTreeMap<String, Value>) -> bool {
    map.contains_key("@rid") || map.contains_key("@class")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::value::RecordId;

    fn user() -> Record {
        Record::new(RecordId::new(5, 0), "User").with("groups", vec!["readonly"])
    }

    fn linked(deleted: bool) -> Value {
        let mut map = BTreeMap::new();
        map.insert("@rid".to_owned(), Value::from("#40:1"));
        map.insert("@class".to_owned(), Value::from("Source"));
        map.insert(
            "deletedAt".to_owned(),
            if deleted { Value::Int(1) } else { Value::Null },
        );
        Value::Map(map)
    }

    #[test]
    fn soft_deleted_records_are_dropped_without_history() {
        let mut deleted = Record::new(RecordId::new(1, 1), "Disease");
        deleted.deleted_at = Some(Value::Int(1_500_000));
        let records = vec![Record::new(RecordId::new(1, 0), "Disease"), deleted];
        assert_eq!(trim_records(records.clone(), false, None).len(), 1);
        assert_eq!(trim_records(records, true, None).len(), 2);
    }

    #[test]
    fn nested_deleted_links_are_removed() {
        let record = Record::new(RecordId::new(1, 0), "Disease")
            .with("source", linked(true))
            .with("subsets", Value::List(vec![linked(false), linked(true)]));
        let trimmed = trim_records(vec![record], false, None);
        assert!(trimmed[0].get("source").is_none());
        assert_eq!(trimmed[0].get("subsets"), Some(&Value::List(vec![linked(false)])));
    }

    #[test]
    fn policy_hides_unreadable_classes() {
        let policy = ClassReadPolicy::new().grant("readonly", ["Disease"]);
        let user = user();
        let viewer = Viewer {
            user: &user,
            policy: &policy,
        };
        let records = vec![
            Record::new(RecordId::new(1, 0), "Disease"),
            Record::new(RecordId::new(2, 0), "User"),
            Record::default().with("cnt", 3_i64),
        ];
        let trimmed = trim_records(records, false, Some(viewer));
        assert_eq!(trimmed.len(), 2);
        assert_eq!(trimmed[0].class.as_deref(), Some("Disease"));
    }
}

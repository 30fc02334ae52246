//! Placeholder allocation shared by every clause builder of one statement.

use std::collections::BTreeMap;

use crate::query::value::Value;

/// Bound values keyed by placeholder name (`param0`, `param1`, ...).
pub type ParamMap = BTreeMap<String, Value>;

/// Allocates placeholder names and records the values bound to them.
///
/// One binder is threaded by `&mut` through a whole statement, nested
/// subqueries included, so the parameter map stays flat and collision free.
#[derive(Debug, Default)]
pub struct ParamBinder {
    next: usize,
    params: ParamMap,
}

impl ParamBinder {
    /// Creates a binder starting at `param0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a binder whose first placeholder is `param{start}`.
    pub fn starting_at(start: usize) -> Self {
        Self {
            next: start,
            params: ParamMap::new(),
        }
    }

    /// Registers `value` under a fresh placeholder and returns its name.
    pub fn bind(&mut self, value: impl Into<Value>) -> String {
        let name = format!("param{}", self.next);
        self.next += 1;
        self.params.insert(name.clone(), value.into());
        name
    }

    /// Index the next call to [`ParamBinder::bind`] will use.
    pub fn next_index(&self) -> usize {
        self.next
    }

    /// Number of values bound so far.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// True when nothing has been bound yet.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Consumes the binder and returns the parameter map.
    pub fn into_params(self) -> ParamMap {
        self.params
    }
}

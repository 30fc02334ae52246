#![allow(dead_code, missing_docs)]

use std::collections::VecDeque;
use std::sync::Once;

use async_trait::async_trait;
use graphkb_query::error::StoreError;
use graphkb_query::query::params::ParamMap;
use graphkb_query::query::schema::InMemorySchema;
use graphkb_query::repo::{Record, StatementExecutor};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

/// Schema document shared by the integration tests and the CLI tests.
pub const SCHEMA_JSON: &str = r#"[
  {"name": "V", "isAbstract": true, "properties": {
    "deletedAt": {"type": "long"}, "createdAt": {"type": "long"}}},
  {"name": "E", "isAbstract": true, "properties": {"deletedAt": {"type": "long"}}},
  {"name": "Source", "inherits": ["V"], "properties": {"name": {"type": "string"}}},
  {"name": "UserGroup", "inherits": ["V"], "properties": {"name": {"type": "string"}}},
  {"name": "User", "inherits": ["V"], "properties": {
    "name": {"type": "string"},
    "groups": {"type": "linkset", "linkedClass": "UserGroup"}}},
  {"name": "Ontology", "inherits": ["V"], "isAbstract": true,
   "properties": {
    "name": {"type": "string"},
    "sourceId": {"type": "string"},
    "source": {"type": "link", "linkedClass": "Source"},
    "subsets": {"type": "embeddedset"}},
   "indices": [{"name": "Ontology.active", "properties": ["source", "sourceId", "name"],
                "unique": true, "active": true}]},
  {"name": "Disease", "inherits": ["Ontology"]},
  {"name": "Vocabulary", "inherits": ["Ontology"]},
  {"name": "Feature", "inherits": ["Ontology"]},
  {"name": "AliasOf", "inherits": ["E"]},
  {"name": "SubClassOf", "inherits": ["E"]},
  {"name": "Variant", "inherits": ["V"], "isAbstract": true, "properties": {
    "type": {"type": "link", "linkedClass": "Vocabulary"},
    "reference1": {"type": "link", "linkedClass": "Feature"},
    "reference2": {"type": "link", "linkedClass": "Feature"}}},
  {"name": "CategoryVariant", "inherits": ["Variant"]},
  {"name": "PositionalVariant", "inherits": ["Variant"], "properties": {
    "break1Repr": {"type": "string"},
    "break2Repr": {"type": "string"},
    "refSeq": {"type": "string"},
    "untemplatedSeq": {"type": "string"}}},
  {"name": "Statement", "inherits": ["V"], "properties": {
    "relevance": {"type": "link", "linkedClass": "Vocabulary"}}}
]"#;

pub fn schema() -> InMemorySchema {
    InMemorySchema::from_json(SCHEMA_JSON).expect("fixture schema")
}

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("graphkb_query=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

/// Executor replaying queued responses in order and recording every call.
/// Calls past the queue return no records.
#[derive(Default)]
pub struct RecordingExecutor {
    responses: Mutex<VecDeque<Result<Vec<Record>, String>>>,
    calls: Mutex<Vec<(String, ParamMap)>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, records: Vec<Record>) -> Self {
        self.responses.lock().push_back(Ok(records));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.responses.lock().push_back(Err(message.to_owned()));
        self
    }

    pub fn calls(&self) -> Vec<(String, ParamMap)> {
        self.calls.lock().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(sql, _)| sql.clone()).collect()
    }
}

#[async_trait]
impl StatementExecutor for RecordingExecutor {
    async fn execute(&self, statement: &str, params: &ParamMap) -> Result<Vec<Record>, StoreError> {
        self.calls.lock().push((statement.to_owned(), params.clone()));
        let next = self.responses.lock().pop_front();
        match next {
            Some(Ok(records)) => Ok(records),
            Some(Err(message)) => Err(message.into()),
            None => Ok(Vec::new()),
        }
    }
}

#![allow(missing_docs)]

mod common;

use std::collections::BTreeMap;

use common::RecordingExecutor;
use graphkb_query::config::QueryConfig;
use graphkb_query::query::{CompiledStatement, QuerySpec, RecordId, Value, WrapperQuery};
use graphkb_query::repo::display::fetch_display_name;
use graphkb_query::repo::select::{
    get_user_by_name, parse_record, select_by_keyword, select_counts, select_from_list,
    user_statement, ClassCount, CountOptions, ParseRecordOptions,
};
use graphkb_query::repo::{select, select_query, ClassReadPolicy, Record, SelectOptions, Viewer};
use graphkb_query::QueryError;

fn disease(position: i64, name: &str) -> Record {
    Record::new(RecordId::new(12, position), "Disease").with("name", name)
}

fn deleted(mut record: Record) -> Record {
    record.deleted_at = Some(Value::Int(1_600_000_000));
    record
}

fn statement() -> CompiledStatement {
    let spec = QuerySpec::new("Disease");
    WrapperQuery::parse(&common::schema(), &QueryConfig::default(), &spec)
        .expect("valid")
        .to_statement()
}

fn exactly(n: usize) -> SelectOptions<'static> {
    SelectOptions {
        exactly_n: Some(n),
        ..SelectOptions::default()
    }
}

#[tokio::test]
async fn exact_cardinality_is_enforced() {
    common::init_tracing();
    let executor = RecordingExecutor::new()
        .respond(vec![disease(0, "a"), disease(1, "b"), disease(2, "c")])
        .respond(vec![disease(0, "a")])
        .respond(Vec::new())
        .respond(vec![disease(0, "a"), disease(1, "b")]);

    let err = select(&executor, &statement(), exactly(2))
        .await
        .expect_err("too many");
    assert!(matches!(err, QueryError::MultipleRecordsFound { .. }), "{err:?}");
    assert_eq!(
        err.to_string(),
        "query returned unexpected number of results. Found 3 results but expected 2 results"
    );
    assert_eq!(err.sql(), Some("SELECT * FROM Disease WHERE deletedAt IS NULL"));

    let err = select(&executor, &statement(), exactly(2))
        .await
        .expect_err("too few");
    assert!(matches!(err, QueryError::NoRecordFound { .. }), "{err:?}");

    let err = select(&executor, &statement(), exactly(2))
        .await
        .expect_err("nothing found");
    assert!(matches!(err, QueryError::NoRecordFound { .. }), "{err:?}");

    let records = select(&executor, &statement(), exactly(2))
        .await
        .expect("exactly two");
    assert_eq!(records.len(), 2);
    assert_eq!(executor.calls().len(), 4);
}

#[tokio::test]
async fn trimming_runs_before_the_cardinality_check() {
    let executor = RecordingExecutor::new()
        .respond(vec![disease(0, "a"), deleted(disease(1, "b")), disease(2, "c")]);
    let records = select(&executor, &statement(), exactly(2))
        .await
        .expect("deleted record is trimmed");
    let names: Vec<_> = records.iter().filter_map(Record::name).collect();
    assert_eq!(names, ["a", "c"]);
}

#[tokio::test]
async fn history_keeps_deleted_records() {
    let executor = RecordingExecutor::new().respond(vec![disease(0, "a"), deleted(disease(1, "b"))]);
    let options = SelectOptions {
        history: true,
        ..SelectOptions::default()
    };
    let records = select(&executor, &statement(), options).await.expect("selected");
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn store_failures_carry_the_statement() {
    let executor = RecordingExecutor::new().fail("connection reset by peer");
    let err = select(&executor, &statement(), SelectOptions::default())
        .await
        .expect_err("store failure");
    assert_eq!(err.code(), "DatabaseError");
    assert_eq!(err.sql(), Some("SELECT * FROM Disease WHERE deletedAt IS NULL"));
    assert!(err.to_string().contains("connection reset by peer"));
}

#[tokio::test]
async fn invalid_requests_never_reach_the_store() {
    let executor = RecordingExecutor::new();
    let schema = common::schema();
    let config = QueryConfig::default();
    let err = select_by_keyword(
        &executor,
        &schema,
        &config,
        "Disease",
        "kras of lung",
        SelectOptions::default(),
    )
    .await
    .expect_err("short word");
    assert_eq!(err.code(), "AttributeError");
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn keyword_search_binds_each_word() {
    let executor = RecordingExecutor::new().respond(vec![disease(0, "lung cancer")]);
    let schema = common::schema();
    let records = select_by_keyword(
        &executor,
        &schema,
        &QueryConfig::default(),
        "Disease",
        "lung cancer",
        SelectOptions::default(),
    )
    .await
    .expect("selected");
    assert_eq!(records.len(), 1);
    let calls = executor.calls();
    assert_eq!(calls[0].1["param0"], Value::from("lung"));
    assert_eq!(calls[0].1["param1"], Value::from("cancer"));
}

#[tokio::test]
async fn viewer_policy_hides_unreadable_records() {
    let user = Record::new(RecordId::new(5, 0), "User").with("groups", vec!["readonly"]);
    let policy = ClassReadPolicy::new().grant("readonly", ["Disease"]);
    let viewer = Viewer {
        user: &user,
        policy: &policy,
    };
    let executor = RecordingExecutor::new().respond(vec![
        disease(0, "a"),
        Record::new(RecordId::new(40, 0), "Source").with("name", "secret"),
    ]);
    let query = WrapperQuery::parse(
        &common::schema(),
        &QueryConfig::default(),
        &QuerySpec::new("Disease"),
    )
    .expect("valid");
    let records = select_query(&executor, &query, None, Some(viewer))
        .await
        .expect("selected");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].class.as_deref(), Some("Disease"));
}

#[tokio::test]
async fn user_lookup_requires_exactly_one_match() {
    let admin = Record::new(RecordId::new(5, 0), "User").with("name", "admin");

    let executor = RecordingExecutor::new().respond(vec![admin.clone()]);
    let user = get_user_by_name(&executor, "admin").await.expect("one user");
    assert_eq!(user.name(), Some("admin"));
    let calls = executor.calls();
    assert_eq!(calls[0].0, user_statement("admin").query);
    assert_eq!(calls[0].1["param0"], Value::from("admin"));

    let executor = RecordingExecutor::new().respond(Vec::new());
    let err = get_user_by_name(&executor, "ghost").await.expect_err("missing");
    assert!(matches!(err, QueryError::NoRecordFound { .. }));
    assert_eq!(err.to_string(), "no user found for the username 'ghost'");

    let twin = Record::new(RecordId::new(5, 1), "User").with("name", "admin");
    let executor = RecordingExecutor::new().respond(vec![admin, twin]);
    let err = get_user_by_name(&executor, "admin").await.expect_err("ambiguous");
    assert!(matches!(err, QueryError::MultipleRecordsFound { .. }));
    assert_eq!(
        err.to_string(),
        "username (admin) is not unique and returned multiple (2) records"
    );
}

#[tokio::test]
async fn counts_per_class_and_per_source() {
    let schema = common::schema();
    let executor = RecordingExecutor::new()
        .respond(vec![Record::default().with("cnt", 4_i64)])
        .respond(vec![Record::default().with("cnt", 2_i64)]);
    let counts = select_counts(
        &executor,
        &schema,
        &CountOptions {
            classes: Some(vec!["Disease".into(), "Source".into()]),
            ..CountOptions::default()
        },
    )
    .await
    .expect("counted");
    assert_eq!(counts["Disease"], ClassCount::Total(4));
    assert_eq!(counts["Source"], ClassCount::Total(2));
    assert_eq!(
        executor.statements(),
        [
            "SELECT count(*) AS cnt FROM Disease WHERE deletedAt IS NULL",
            "SELECT count(*) AS cnt FROM Source WHERE deletedAt IS NULL",
        ]
    );

    let executor = RecordingExecutor::new().respond(vec![
        Record::default().with("source", "#40:1").with("cnt", 3_i64),
        Record::default().with("source", Value::Null).with("cnt", 1_i64),
    ]);
    let counts = select_counts(
        &executor,
        &schema,
        &CountOptions {
            classes: Some(vec!["Disease".into()]),
            group_by_source: true,
            history: true,
        },
    )
    .await
    .expect("counted");
    let expected: BTreeMap<String, u64> = [("#40:1".to_owned(), 3), ("null".to_owned(), 1)]
        .into_iter()
        .collect();
    assert_eq!(counts["Disease"], ClassCount::BySource(expected));
}

#[tokio::test]
async fn counts_default_to_terminal_classes() {
    let schema = common::schema();
    let executor = RecordingExecutor::new();
    let counts = select_counts(&executor, &schema, &CountOptions::default())
        .await
        .expect("counted");
    assert!(counts.contains_key("Disease"));
    assert!(!counts.contains_key("Ontology"));
    assert!(!counts.contains_key("V"));
    assert_eq!(executor.calls().len(), counts.len());
}

#[tokio::test]
async fn record_list_requires_every_id() {
    let schema = common::schema();
    let executor = RecordingExecutor::new().respond(vec![disease(3, "a")]);
    let rids = vec!["#12:3".to_owned(), "#12:4".to_owned()];
    let err = select_from_list(
        &executor,
        &schema,
        &QueryConfig::default(),
        &rids,
        None,
        SelectOptions::default(),
    )
    .await
    .expect_err("one id missing");
    assert!(matches!(err, QueryError::NoRecordFound { .. }));
    assert_eq!(executor.statements(), ["SELECT * FROM [#12:3, #12:4]"]);
}

#[tokio::test]
async fn category_variant_names_come_from_linked_records() {
    let schema = common::schema();
    let content = Record::new(RecordId::new(30, 1), "CategoryVariant")
        .with("type", RecordId::new(20, 0))
        .with("reference1", RecordId::new(21, 0));
    let executor = RecordingExecutor::new().respond(vec![
        Record::new(RecordId::new(20, 0), "Vocabulary").with("name", "mutation"),
        Record::new(RecordId::new(21, 0), "Feature")
            .with("name", "kras")
            .with("displayName", "KRAS"),
    ]);
    let name = fetch_display_name(&executor, &schema, "CategoryVariant", &content)
        .await
        .expect("resolved");
    assert_eq!(name.as_deref(), Some("KRAS mutation"));
    assert_eq!(
        executor.statements(),
        ["SELECT @rid, displayName, name FROM (SELECT * FROM [#20:0, #21:0])"]
    );
}

#[tokio::test]
async fn plain_classes_use_the_stored_name() {
    let schema = common::schema();
    let executor = RecordingExecutor::new();
    let name = fetch_display_name(&executor, &schema, "Disease", &disease(0, "cancer"))
        .await
        .expect("resolved");
    assert_eq!(name.as_deref(), Some("cancer"));

    let statement = Record::new(RecordId::new(50, 0), "Statement");
    let name = fetch_display_name(&executor, &schema, "Statement", &statement)
        .await
        .expect("resolved");
    assert_eq!(name, None);
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn missing_linked_record_fails_the_lookup() {
    let schema = common::schema();
    let content = Record::new(RecordId::new(30, 1), "CategoryVariant")
        .with("type", RecordId::new(20, 0))
        .with("reference1", RecordId::new(21, 0));
    let executor = RecordingExecutor::new()
        .respond(vec![Record::new(RecordId::new(20, 0), "Vocabulary").with("name", "mutation")]);
    let err = fetch_display_name(&executor, &schema, "CategoryVariant", &content)
        .await
        .expect_err("reference1 missing");
    assert!(matches!(err, QueryError::NoRecordFound { .. }));
}

#[test]
fn record_content_matches_on_the_active_index() {
    let schema = common::schema();
    let mut source = BTreeMap::new();
    source.insert("@rid".to_owned(), Value::from("#40:1"));
    source.insert("name".to_owned(), Value::from("disease ontology"));
    let content: BTreeMap<String, Value> = [
        ("name".to_owned(), Value::from("cancer")),
        ("sourceId".to_owned(), Value::from("doid:162")),
        ("source".to_owned(), Value::Map(source)),
        ("subsets".to_owned(), Value::from(vec!["a"])),
        ("unrelated".to_owned(), Value::from(1_i64)),
    ]
    .into_iter()
    .collect();

    let query = parse_record(
        &schema,
        &QueryConfig::default(),
        "Disease",
        &content,
        ParseRecordOptions {
            active_index_only: true,
            ..ParseRecordOptions::default()
        },
    )
    .expect("valid");
    let statement = query.to_statement();
    assert_eq!(
        statement.query,
        "SELECT * FROM Disease WHERE (source = :param0 AND sourceId = :param1 AND name = :param2 AND deletedAt IS NULL)"
    );
    assert_eq!(statement.params["param0"], Value::from("#40:1"));
}

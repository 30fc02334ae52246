//! Statement execution and post-processing.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::QueryConfig;
use crate::error::{QueryError, Result};
use crate::query::ast::Operator;
use crate::query::params::ParamBinder;
use crate::query::schema::SchemaProvider;
use crate::query::spec::{FilterSpec, LeafSpec, OperandSpec, QuerySpec, TargetSpec};
use crate::query::statement::CompiledStatement;
use crate::query::subquery::DELETED_AT;
use crate::query::value::Value;
use crate::query::wrapper::WrapperQuery;
use crate::repo::access::{trim_records, Viewer};
use crate::repo::executor::StatementExecutor;
use crate::repo::record::Record;

/// Options of a single [`select`] call.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectOptions<'a> {
    /// Exact number of records the caller requires after trimming.
    pub exactly_n: Option<usize>,
    /// Keep soft-deleted records.
    pub history: bool,
    /// Trim by permission on behalf of this user; `None` skips the check.
    pub viewer: Option<Viewer<'a>>,
}

/// Executes `statement`, trims the result and enforces the cardinality
/// contract.
///
/// Executor failures are wrapped once into [`QueryError::Database`] with the
/// statement text. With `exactly_n`, fewer records yield
/// [`QueryError::NoRecordFound`] and any other mismatch
/// [`QueryError::MultipleRecordsFound`].
pub async fn select<E>(
    executor: &E,
    statement: &CompiledStatement,
    options: SelectOptions<'_>,
) -> Result<Vec<Record>>
where
    E: StatementExecutor + ?Sized,
{
    debug!(
        statement = %statement.display(),
        params = statement.params.len(),
        "query.select.begin"
    );
    let records = match executor.execute(&statement.query, &statement.params).await {
        Ok(records) => records,
        Err(source) => {
            let err = QueryError::wrap_store(source, statement.query.clone());
            warn!(
                statement = %statement.display(),
                error = %err.with_code(),
                "query.select.failed"
            );
            return Err(err);
        }
    };
    let selected = records.len();
    let records = trim_records(records, options.history, options.viewer);
    debug!(selected, kept = records.len(), "query.select.completed");

    if let Some(expected) = options.exactly_n {
        if records.len() < expected {
            return Err(QueryError::NoRecordFound {
                message: format!(
                    "query expected {expected} records but only found {}",
                    records.len()
                ),
                sql: Some(statement.display()),
            });
        }
        if records.len() != expected {
            return Err(QueryError::MultipleRecordsFound {
                message: format!(
                    "query returned unexpected number of results. Found {} results but expected {expected} results",
                    records.len()
                ),
                sql: Some(statement.display()),
            });
        }
    }
    Ok(records)
}

/// Renders and selects a parsed query, trimming history as the query asks.
pub async fn select_query<E>(
    executor: &E,
    query: &WrapperQuery,
    exactly_n: Option<usize>,
    viewer: Option<Viewer<'_>>,
) -> Result<Vec<Record>>
where
    E: StatementExecutor + ?Sized,
{
    let statement = query.to_statement();
    select(
        executor,
        &statement,
        SelectOptions {
            exactly_n,
            history: query.history(),
            viewer,
        },
    )
    .await
}

/// Options of [`select_counts`].
#[derive(Clone, Debug, Default)]
pub struct CountOptions {
    /// Classes to count; terminal classes of the schema when `None`.
    pub classes: Option<Vec<String>>,
    /// Split every class count by its `source` link.
    pub group_by_source: bool,
    /// Count soft-deleted records too.
    pub history: bool,
}

/// Record count of one class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ClassCount {
    /// Count over the whole class.
    Total(u64),
    /// Keyed by source record id; records without a source under `"null"`.
    BySource(BTreeMap<String, u64>),
}

/// Aggregate statement counting `class`.
pub fn count_statement(class: &str, group_by_source: bool, history: bool) -> CompiledStatement {
    let active = if history {
        String::new()
    } else {
        format!(" WHERE {DELETED_AT} IS NULL")
    };
    let query = if group_by_source {
        format!("SELECT source, count(*) AS cnt FROM {class}{active} GROUP BY source")
    } else {
        format!("SELECT count(*) AS cnt FROM {class}{active}")
    };
    CompiledStatement::new(query, ParamBinder::new().into_params())
}

/// Counts records per class, one aggregate statement per class.
pub async fn select_counts<E>(
    executor: &E,
    schema: &dyn SchemaProvider,
    options: &CountOptions,
) -> Result<BTreeMap<String, ClassCount>>
where
    E: StatementExecutor + ?Sized,
{
    let classes = match &options.classes {
        Some(classes) => classes
            .iter()
            .map(|class| schema.require_model(class).map(|model| model.name.clone()))
            .collect::<Result<Vec<_>>>()?,
        None => schema.terminal_classes(),
    };
    let mut counts = BTreeMap::new();
    for class in classes {
        let statement = count_statement(&class, options.group_by_source, options.history);
        let unfiltered = SelectOptions {
            history: true,
            ..SelectOptions::default()
        };
        let rows = select(executor, &statement, unfiltered).await?;
        let count = if options.group_by_source {
            ClassCount::BySource(
                rows.iter()
                    .map(|row| (source_key(row), row_count(row)))
                    .collect(),
            )
        } else {
            ClassCount::Total(rows.iter().map(row_count).sum())
        };
        counts.insert(class, count);
    }
    debug!(classes = counts.len(), "query.select_counts.completed");
    Ok(counts)
}

fn row_count(row: &Record) -> u64 {
    match row.get("cnt") {
        Some(Value::Int(n)) => u64::try_from(*n).unwrap_or(0),
        _ => 0,
    }
}

fn source_key(row: &Record) -> String {
    match row.get("source") {
        Some(value) => match value.as_stored_record_id() {
            Some(rid) => rid.to_string(),
            None => value.as_str().unwrap_or("null").to_owned(),
        },
        None => "null".to_owned(),
    }
}

/// Statement selecting an active user with its groups expanded.
pub fn user_statement(username: &str) -> CompiledStatement {
    let mut binder = ParamBinder::new();
    let param = binder.bind(username);
    CompiledStatement::new(
        format!(
            "SELECT *, groups:{{*, @rid, @class}} from User where name = :{param} AND {DELETED_AT} IS NULL"
        ),
        binder.into_params(),
    )
}

/// The single active user named `username`.
pub async fn get_user_by_name<E>(executor: &E, username: &str) -> Result<Record>
where
    E: StatementExecutor + ?Sized,
{
    debug!(username, "query.get_user_by_name");
    let statement = user_statement(username);
    let mut users = select(
        executor,
        &statement,
        SelectOptions {
            history: true,
            ..SelectOptions::default()
        },
    )
    .await?;
    match users.len() {
        1 => Ok(users.remove(0)),
        0 => Err(QueryError::NoRecordFound {
            message: format!("no user found for the username '{username}'"),
            sql: Some(statement.display()),
        }),
        n => {
            let rids: Vec<String> = users
                .iter()
                .filter_map(|user| user.rid.map(|rid| rid.to_string()))
                .collect();
            warn!(username, rids = %rids.join(", "), "query.get_user_by_name.ambiguous");
            Err(QueryError::MultipleRecordsFound {
                message: format!(
                    "username ({username}) is not unique and returned multiple ({n}) records"
                ),
                sql: Some(statement.display()),
            })
        }
    }
}

/// Request matching every whitespace-separated word of `keyword` against
/// the `name` of `target` records with the full-text operator.
pub fn keyword_query(
    schema: &dyn SchemaProvider,
    config: &QueryConfig,
    target: &str,
    keyword: &str,
) -> Result<QuerySpec> {
    let words: Vec<&str> = keyword.split_whitespace().collect();
    if words.is_empty() {
        return Err(QueryError::attribute("keyword query parameter is required"));
    }
    if let Some(short) = words
        .iter()
        .find(|word| word.chars().count() < config.min_word_size)
    {
        return Err(QueryError::attribute(format!(
            "Word \"{short}\" is too short to query with ~ operator. Must be at least {} letters after splitting on whitespace characters",
            config.min_word_size
        )));
    }
    schema.require_model(target)?.require_property("name")?;
    let leaves = words
        .into_iter()
        .map(|word| {
            FilterSpec::Leaf(LeafSpec {
                property: "name".to_owned(),
                operator: Some(Operator::ContainsText),
                value: OperandSpec::Value(Value::from(word)),
                negate: false,
            })
        })
        .collect();
    Ok(QuerySpec {
        filters: Some(FilterSpec::And(leaves)),
        ..QuerySpec::new(target)
    })
}

/// Full-text search over `target` by name. Short words fail before any
/// statement is sent.
pub async fn select_by_keyword<E>(
    executor: &E,
    schema: &dyn SchemaProvider,
    config: &QueryConfig,
    target: &str,
    keyword: &str,
    options: SelectOptions<'_>,
) -> Result<Vec<Record>>
where
    E: StatementExecutor + ?Sized,
{
    let spec = QuerySpec {
        history: options.history,
        ..keyword_query(schema, config, target, keyword)?
    };
    let query = WrapperQuery::parse(schema, config, &spec)?;
    select(executor, &query.to_statement(), options).await
}

/// Fetches every record in `rids`, optionally expanding `neighbors` levels
/// of links. Fails unless every id resolves to a visible record.
pub async fn select_from_list<E>(
    executor: &E,
    schema: &dyn SchemaProvider,
    config: &QueryConfig,
    rids: &[String],
    neighbors: Option<u32>,
    options: SelectOptions<'_>,
) -> Result<Vec<Record>>
where
    E: StatementExecutor + ?Sized,
{
    let spec = QuerySpec {
        target: TargetSpec::Records(rids.to_vec()),
        neighbors,
        history: options.history,
        ..QuerySpec::default()
    };
    let query = WrapperQuery::parse(schema, config, &spec)?;
    select(
        executor,
        &query.to_statement(),
        SelectOptions {
            exactly_n: Some(rids.len()),
            ..options
        },
    )
    .await
}

/// Options of [`parse_record`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ParseRecordOptions {
    /// Match soft-deleted records too.
    pub history: bool,
    /// Compare only the properties covered by the class's active unique
    /// indices.
    pub active_index_only: bool,
}

/// Query finding the stored record matching `content`.
///
/// Every class property present in `content` becomes an equality leaf;
/// expanded links compare by record id.
pub fn parse_record(
    schema: &dyn SchemaProvider,
    config: &QueryConfig,
    class: &str,
    content: &BTreeMap<String, Value>,
    options: ParseRecordOptions,
) -> Result<WrapperQuery> {
    let model = schema.require_model(class)?;
    let properties: Vec<String> = if options.active_index_only {
        model.active_properties().ok_or_else(|| {
            QueryError::attribute(format!(
                "class ({}) has no active unique index to match on",
                model.name
            ))
        })?
    } else {
        model.properties.keys().cloned().collect()
    };
    let leaves = properties
        .iter()
        .filter_map(|name| content.get(name).map(|value| (name, value)))
        .map(|(name, value)| {
            let value = match value {
                Value::Map(_) => value
                    .as_record_id()
                    .map(Value::from)
                    .unwrap_or_else(|| value.clone()),
                other => other.clone(),
            };
            FilterSpec::Leaf(LeafSpec {
                property: name.clone(),
                operator: Some(Operator::Eq),
                value: OperandSpec::Value(value),
                negate: false,
            })
        })
        .collect();
    let spec = QuerySpec {
        filters: Some(FilterSpec::And(leaves)),
        history: options.history,
        ..QuerySpec::new(model.name.clone())
    };
    WrapperQuery::parse(schema, config, &spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_statements() {
        assert_eq!(
            count_statement("Disease", false, false).query,
            "SELECT count(*) AS cnt FROM Disease WHERE deletedAt IS NULL"
        );
        assert_eq!(
            count_statement("Disease", true, true).query,
            "SELECT source, count(*) AS cnt FROM Disease GROUP BY source"
        );
    }

    #[test]
    fn user_statement_binds_the_name() {
        let statement = user_statement("admin");
        assert_eq!(
            statement.query,
            "SELECT *, groups:{*, @rid, @class} from User where name = :param0 AND deletedAt IS NULL"
        );
        assert_eq!(statement.params["param0"], Value::from("admin"));
    }
}

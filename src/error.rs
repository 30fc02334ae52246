//! Error types of the query core.

use std::fmt;

use thiserror::Error;

/// Opaque failure surfaced by a statement executor.
pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the query core.
pub type Result<T> = std::result::Result<T, QueryError>;

/// Typed errors raised while compiling or executing a query.
///
/// Compilation errors are always [`QueryError::Attribute`]; the cardinality
/// variants carry the statement that produced the unexpected result.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed or schema-invalid query input.
    #[error("{0}")]
    Attribute(String),
    /// Fewer records than the caller required.
    #[error("{message}")]
    NoRecordFound {
        /// Human readable description.
        message: String,
        /// Statement that was executed, when one was sent.
        sql: Option<String>,
    },
    /// More records than the caller required, or an ambiguous unique lookup.
    #[error("{message}")]
    MultipleRecordsFound {
        /// Human readable description.
        message: String,
        /// Statement that was executed, when one was sent.
        sql: Option<String>,
    },
    /// Any other failure reported by the store.
    #[error("error executing statement ({sql}): {source}")]
    Database {
        /// Statement text that failed.
        sql: String,
        /// Raw failure from the executor.
        #[source]
        source: StoreError,
    },
}

impl QueryError {
    /// Builds a [`QueryError::Attribute`].
    pub fn attribute(message: impl Into<String>) -> Self {
        QueryError::Attribute(message.into())
    }

    /// Wraps a raw executor failure once, attaching the failing statement.
    ///
    /// Failures that already are a `QueryError` are passed through unchanged.
    pub fn wrap_store(source: StoreError, sql: impl Into<String>) -> Self {
        match source.downcast::<QueryError>() {
            Ok(err) => *err,
            Err(source) => QueryError::Database {
                sql: sql.into(),
                source,
            },
        }
    }

    /// Returns the statement text attached to the error, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            QueryError::Attribute(_) => None,
            QueryError::NoRecordFound { sql, .. } | QueryError::MultipleRecordsFound { sql, .. } => {
                sql.as_deref()
            }
            QueryError::Database { sql, .. } => Some(sql),
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Attribute(_) => "AttributeError",
            QueryError::NoRecordFound { .. } => "NoRecordFoundError",
            QueryError::MultipleRecordsFound { .. } => "MultipleRecordsFoundError",
            QueryError::Database { .. } => "DatabaseError",
        }
    }

    /// Display adapter prefixing the message with [`QueryError::code`].
    pub fn with_code(&self) -> QueryErrorWithCode<'_> {
        QueryErrorWithCode(self)
    }
}

/// Formats a [`QueryError`] prefixed with its code.
pub struct QueryErrorWithCode<'a>(pub &'a QueryError);

impl fmt::Display for QueryErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}

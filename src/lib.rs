//! Compiles declarative record queries into parameterized statements for an
//! OrientDB-style property graph, executes them through a caller-supplied
//! executor, and trims and decorates the results.
//!
//! ```no_run
//! use graphkb_query::config::QueryConfig;
//! use graphkb_query::query::schema::InMemorySchema;
//! use graphkb_query::query::{QuerySpec, WrapperQuery};
//!
//! # fn main() -> graphkb_query::error::Result<()> {
//! let schema = InMemorySchema::from_json(&std::fs::read_to_string("schema.json").unwrap_or_default())?;
//! let spec = QuerySpec::from_json(r#"{"target": "Disease", "filters": {"name": "cancer"}}"#)?;
//! let statement = WrapperQuery::parse(&schema, &QueryConfig::default(), &spec)?.to_statement();
//! println!("{} {:?}", statement.query, statement.params);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod query;
pub mod repo;

pub use error::{QueryError, Result};

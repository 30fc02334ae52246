#![forbid(unsafe_code)]

//! Query compilation.
//!
//! A [`spec::QuerySpec`] (decoded from JSON or assembled with
//! [`builder::QueryBuilder`]) is validated against a
//! [`schema::SchemaProvider`] into a [`wrapper::WrapperQuery`], which renders
//! a parameterized [`statement::CompiledStatement`]. Compilation does no I/O
//! and the same request always renders the same text.

/// Boolean filter trees and their rendering.
pub mod ast;

/// Fluent API for assembling requests in Rust code.
pub mod builder;

/// Schema-checked filter construction.
pub mod filter;

/// Placeholder allocation.
pub mod params;

/// Projection clauses.
pub mod projection;

/// Class metadata consumed by the compiler.
pub mod schema;

/// Request shape and JSON decoding.
pub mod spec;

/// Compiled statement text plus parameters.
pub mod statement;

/// Inner selections.
pub mod subquery;

/// `MATCH` and `TRAVERSE` clauses.
pub mod traversal;

/// Literal values and record ids.
pub mod value;

/// Outer query clauses.
pub mod wrapper;

pub use builder::QueryBuilder;
pub use spec::QuerySpec;
pub use statement::CompiledStatement;
pub use value::{RecordId, Value};
pub use wrapper::WrapperQuery;

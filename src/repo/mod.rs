#![forbid(unsafe_code)]

//! Execution of compiled statements and post-processing of their results.

/// Visibility policies and trimming.
pub mod access;

/// Computed display names.
pub mod display;

/// Executor seam.
pub mod executor;

/// Store records.
pub mod record;

/// Selection, cardinality checks and the lookups built on them.
pub mod select;

pub use access::{AccessPolicy, ClassReadPolicy, Viewer};
pub use executor::StatementExecutor;
pub use record::Record;
pub use select::{select, select_query, SelectOptions};

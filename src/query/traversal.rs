//! Graph traversal clauses: bounded `MATCH` neighborhoods and `TRAVERSE`
//! walks along an edge allowlist.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::query::ast::Filter;
use crate::query::params::ParamBinder;
use crate::query::statement::CompiledStatement;

/// Edge direction followed by a traversal.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Incoming edges.
    In,
    /// Outgoing edges.
    Out,
    /// Edges in both directions.
    #[default]
    Both,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::Both => "both",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders `SELECT * FROM <class> [WHERE <expr>]`.
pub(crate) fn select_from(class: &str, filter: Option<&Filter>, binder: &mut ParamBinder) -> String {
    match filter.and_then(|f| f.render(binder)) {
        Some(expr) => format!("SELECT * FROM {class} WHERE {expr}"),
        None => format!("SELECT * FROM {class}"),
    }
}

fn edge_call(direction: Direction, edges: &[String]) -> String {
    let quoted: Vec<String> = edges.iter().map(|edge| format!("'{edge}'")).collect();
    format!("{direction}({})", quoted.join(", "))
}

/// Depth-bounded pattern match around the records selected by a filter.
///
/// Class and edge names are interpolated as identifiers; callers validate
/// them against the schema first.
#[derive(Clone, Copy, Debug)]
pub struct Neighborhood<'a> {
    /// Class of the root records.
    pub model_name: &'a str,
    /// Filter selecting the root records.
    pub where_clause: Option<&'a Filter>,
    /// Edge classes to follow; empty follows every edge.
    pub edges: &'a [String],
    /// Direction to follow the edges in.
    pub direction: Direction,
    /// Maximum number of hops.
    pub depth: u32,
}

impl Neighborhood<'_> {
    /// Renders the traversal, binding filter values through `binder`.
    pub fn render(&self, binder: &mut ParamBinder) -> String {
        let root = match self.where_clause {
            Some(filter) => match filter.render(binder) {
                Some(expr) if filter.renders_grouped() => {
                    format!("{{class: {}, WHERE: {expr}}}", self.model_name)
                }
                Some(expr) => format!("{{class: {}, WHERE: ({expr})}}", self.model_name),
                None => format!("{{class: {}}}", self.model_name),
            },
            None => format!("{{class: {}}}", self.model_name),
        };
        format!(
            "SELECT * FROM (MATCH {root}.{}{{WHILE: ($depth < {})}} RETURN DISTINCT $pathElements)",
            edge_call(self.direction, self.edges),
            self.depth
        )
    }

    /// Renders the traversal as a standalone statement.
    pub fn to_statement(&self) -> CompiledStatement {
        let mut binder = ParamBinder::new();
        let query = self.render(&mut binder);
        CompiledStatement::new(query, binder.into_params())
    }
}

/// Depth-first walk from the records selected by a filter along an edge
/// allowlist.
#[derive(Clone, Copy, Debug)]
pub struct Descendants<'a> {
    /// Class of the root records.
    pub model_name: &'a str,
    /// Filter selecting the root records.
    pub where_clause: Option<&'a Filter>,
    /// Edge classes to follow.
    pub edges: &'a [String],
    /// `Out` for descendants, `In` for ancestors.
    pub direction: Direction,
    /// Walk depth bound.
    pub max_depth: u32,
}

impl Descendants<'_> {
    /// Renders the walk, binding filter values through `binder`.
    pub fn render(&self, binder: &mut ParamBinder) -> String {
        let inner = select_from(self.model_name, self.where_clause, binder);
        format!(
            "TRAVERSE {} FROM ({inner}) MAXDEPTH {}",
            edge_call(self.direction, self.edges),
            self.max_depth
        )
    }

    /// Renders the walk as a standalone statement.
    pub fn to_statement(&self) -> CompiledStatement {
        let mut binder = ParamBinder::new();
        let query = self.render(&mut binder);
        CompiledStatement::new(query, binder.into_params())
    }
}

//! Inner selection of a query: target, filter, active-record predicate and
//! traversal style.

#![allow(missing_docs)]

use crate::config::QueryConfig;
use crate::error::{QueryError, Result};
use crate::query::ast::{Comparison, Filter};
use crate::query::params::ParamBinder;
use crate::query::schema::SchemaProvider;
use crate::query::spec::{QuerySpec, QueryType, TargetSpec};
use crate::query::statement::CompiledStatement;
use crate::query::traversal::{select_from, Descendants, Direction, Neighborhood};
use crate::query::value::RecordId;

/// Soft-delete timestamp; records with it set are inactive.
pub const DELETED_AT: &str = "deletedAt";

/// Where the inner selection reads from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubqueryTarget {
    /// Records of a class known to the schema.
    Class(String),
    /// Explicit record ids.
    Records(Vec<RecordId>),
}

/// Traversal applied around the filtered root records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Traversal {
    /// Depth-bounded `MATCH` in one direction.
    Neighborhood {
        edges: Vec<String>,
        direction: Direction,
        depth: u32,
    },
    /// `TRAVERSE` walk along the allowlist, `Out` for descendants and `In`
    /// for ancestors.
    Walk {
        edges: Vec<String>,
        direction: Direction,
        max_depth: u32,
    },
}

/// Validated inner selection.
#[derive(Clone, Debug)]
pub struct Subquery {
    target: SubqueryTarget,
    filter: Option<Filter>,
    history: bool,
    traversal: Option<Traversal>,
}

impl Subquery {
    /// Validates the selection part of `spec` against the schema.
    ///
    /// Outer options (projection, ordering, pagination, count) are rejected
    /// on nested requests; [`crate::query::wrapper::WrapperQuery::parse`]
    /// strips them before calling this for the top level.
    pub fn parse(schema: &dyn SchemaProvider, config: &QueryConfig, spec: &QuerySpec) -> Result<Self> {
        if spec.has_outer_options() {
            return Err(QueryError::attribute(
                "subqueries accept only target, filters, traversal and history options",
            ));
        }
        match &spec.target {
            TargetSpec::Records(rids) => Self::parse_records(spec, rids),
            TargetSpec::Class(class) => {
                let model = schema.require_model(class)?;
                let filter = spec
                    .filters
                    .as_ref()
                    .map(|filters| filters.build(schema, config, &model.name))
                    .transpose()?
                    .filter(|filter| !filter.is_empty());
                let traversal = parse_traversal(schema, config, spec)?;
                Ok(Self {
                    target: SubqueryTarget::Class(model.name.clone()),
                    filter,
                    history: spec.history,
                    traversal,
                })
            }
        }
    }

    fn parse_records(spec: &QuerySpec, rids: &[String]) -> Result<Self> {
        if spec.filters.is_some()
            || spec.edges.is_some()
            || spec.direction.is_some()
            || spec.depth.is_some()
            || spec.query_type.is_some()
        {
            return Err(QueryError::attribute(
                "a record id target cannot be combined with filters or traversal",
            ));
        }
        if rids.is_empty() {
            return Err(QueryError::attribute("record id target must not be empty"));
        }
        let rids = rids
            .iter()
            .map(|rid| rid.parse::<RecordId>())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::records(rids, spec.history))
    }

    /// Identity lookup of explicit records.
    pub fn records(rids: Vec<RecordId>, history: bool) -> Self {
        Self {
            target: SubqueryTarget::Records(rids),
            filter: None,
            history,
            traversal: None,
        }
    }

    /// Filtered selection over an already validated class.
    pub fn class(class: impl Into<String>, filter: Option<Filter>, history: bool) -> Self {
        Self {
            target: SubqueryTarget::Class(class.into()),
            filter,
            history,
            traversal: None,
        }
    }

    /// Adds a traversal around the selected records.
    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = Some(traversal);
        self
    }

    pub fn target(&self) -> &SubqueryTarget {
        &self.target
    }

    pub fn traversal(&self) -> Option<&Traversal> {
        self.traversal.as_ref()
    }

    pub fn history(&self) -> bool {
        self.history
    }

    /// Caller filter conjoined with the active-record predicate.
    fn effective_filter(&self) -> Option<Filter> {
        let active = || Filter::from(Comparison::is_null(DELETED_AT));
        match (&self.filter, self.history) {
            (Some(filter), true) => Some(filter.clone()),
            (Some(filter), false) => Some(filter.clone().and_also(active())),
            (None, true) => None,
            (None, false) => Some(active()),
        }
    }

    /// Renders the selection, binding values through the shared `binder`.
    pub fn compile(&self, binder: &mut ParamBinder) -> String {
        let class = match &self.target {
            SubqueryTarget::Records(rids) => {
                let list: Vec<String> = rids.iter().map(RecordId::to_string).collect();
                return format!("SELECT * FROM [{}]", list.join(", "));
            }
            SubqueryTarget::Class(class) => class,
        };
        let filter = self.effective_filter();
        match &self.traversal {
            None => select_from(class, filter.as_ref(), binder),
            Some(Traversal::Neighborhood {
                edges,
                direction,
                depth,
            }) => Neighborhood {
                model_name: class,
                where_clause: filter.as_ref(),
                edges,
                direction: *direction,
                depth: *depth,
            }
            .render(binder),
            Some(Traversal::Walk {
                edges,
                direction,
                max_depth,
            }) => Descendants {
                model_name: class,
                where_clause: filter.as_ref(),
                edges,
                direction: *direction,
                max_depth: *max_depth,
            }
            .render(binder),
        }
    }

    /// Renders the selection as a standalone statement numbered from `param0`.
    pub fn to_statement(&self) -> CompiledStatement {
        let mut binder = ParamBinder::new();
        let query = self.compile(&mut binder);
        CompiledStatement::new(query, binder.into_params())
    }
}

fn parse_traversal(
    schema: &dyn SchemaProvider,
    config: &QueryConfig,
    spec: &QuerySpec,
) -> Result<Option<Traversal>> {
    let style = match spec.query_type {
        Some(style) => Some(style),
        None if spec.direction.is_some() || spec.depth.is_some() => Some(QueryType::Neighborhood),
        None if spec.edges.is_some() => Some(QueryType::Descendants),
        None => None,
    };
    let Some(style) = style else {
        return Ok(None);
    };
    let edges = spec.edges.clone().unwrap_or_default();
    for edge in &edges {
        schema
            .model(edge)
            .ok_or_else(|| QueryError::attribute(format!("Invalid edge class ({edge})")))?;
    }
    if let Some(depth) = spec.depth {
        if depth > config.max_depth {
            return Err(QueryError::attribute(format!(
                "depth ({depth}) exceeds the maximum traversal depth ({})",
                config.max_depth
            )));
        }
    }
    let traversal = match style {
        QueryType::Neighborhood => {
            let depth = spec.depth.unwrap_or(config.related_node_depth);
            if depth == 0 {
                return Err(QueryError::attribute(
                    "neighborhood depth must be at least 1",
                ));
            }
            Traversal::Neighborhood {
                edges,
                direction: spec.direction.unwrap_or_default(),
                depth,
            }
        }
        QueryType::Descendants | QueryType::Ancestors => {
            if spec.direction.is_some() {
                return Err(QueryError::attribute(
                    "direction cannot be combined with a descendants or ancestors query",
                ));
            }
            if edges.is_empty() {
                return Err(QueryError::attribute(
                    "descendants and ancestors queries require at least one edge class",
                ));
            }
            Traversal::Walk {
                edges,
                direction: if style == QueryType::Ancestors {
                    Direction::In
                } else {
                    Direction::Out
                },
                max_depth: spec.depth.unwrap_or(config.max_depth),
            }
        }
    };
    Ok(Some(traversal))
}

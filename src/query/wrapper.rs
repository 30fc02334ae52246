//! Outer query: projection, ordering, pagination and count aggregation
//! around a compiled [`Subquery`].

use tracing::debug;

use crate::config::QueryConfig;
use crate::error::{QueryError, Result};
use crate::query::projection::{
    nested_projection, resolve_properties, resolve_untyped, DEFAULT_PROJECTION,
};
use crate::query::schema::SchemaProvider;
use crate::query::spec::{QuerySpec, SortDirection, TargetSpec};
use crate::query::statement::CompiledStatement;
use crate::query::subquery::Subquery;

/// Outer clauses applied by [`wrap`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WrapOptions {
    /// Projection override; `None` and `*` both mean every property.
    pub projection: Option<String>,
    /// Properties to order by, already validated.
    pub order_by: Vec<String>,
    /// Direction applied to every ordering property; ascending when unset.
    pub order_by_direction: Option<SortDirection>,
    /// Rows to skip; zero emits no `SKIP`.
    pub skip: u64,
    /// Row cap; `None` means no cap and `Some(0)` returns nothing.
    pub limit: Option<u64>,
    /// Replace the rows with their count.
    pub count: bool,
}

impl WrapOptions {
    fn projection_override(&self) -> Option<&str> {
        self.projection
            .as_deref()
            .filter(|projection| *projection != DEFAULT_PROJECTION)
    }

    fn is_passthrough(&self) -> bool {
        self.projection_override().is_none()
            && !self.count
            && self.order_by.is_empty()
            && self.skip == 0
            && self.limit.is_none()
    }
}

/// Applies the outer clauses to `inner`.
///
/// Returns `inner` untouched when nothing is requested. A count replaces the
/// projection and suppresses ordering and pagination. Otherwise clauses are
/// appended as `ORDER BY`, `SKIP`, `LIMIT`, in that order.
pub fn wrap(inner: CompiledStatement, options: &WrapOptions) -> CompiledStatement {
    if options.is_passthrough() {
        return inner;
    }
    let CompiledStatement { query, params } = inner;
    if options.count {
        if !options.order_by.is_empty() || options.skip != 0 || options.limit.is_some() {
            debug!(
                skip = options.skip,
                limit = ?options.limit,
                order_by = options.order_by.len(),
                "query.wrap.count_ignores_pagination"
            );
        }
        return CompiledStatement::new(format!("SELECT count(*) AS count FROM ({query})"), params);
    }
    let mut statement = match options.projection_override() {
        Some(projection) => format!("SELECT {projection} FROM ({query})"),
        None => query,
    };
    if !options.order_by.is_empty() {
        let direction = options.order_by_direction.unwrap_or_default().keyword();
        let ordering: Vec<String> = options
            .order_by
            .iter()
            .map(|prop| format!("{prop} {direction}"))
            .collect();
        statement = format!("{statement} ORDER BY {}", ordering.join(", "));
    }
    if options.skip != 0 {
        statement = format!("{statement} SKIP {}", options.skip);
    }
    if let Some(limit) = options.limit {
        statement = format!("{statement} LIMIT {limit}");
    }
    CompiledStatement::new(statement, params)
}

/// Fully validated query, ready to render.
#[derive(Clone, Debug)]
pub struct WrapperQuery {
    target: String,
    query: Subquery,
    options: WrapOptions,
    history: bool,
}

impl WrapperQuery {
    /// Validates `spec` against the schema and the configured limits.
    pub fn parse(schema: &dyn SchemaProvider, config: &QueryConfig, spec: &QuerySpec) -> Result<Self> {
        if spec.neighbors.is_some() && spec.return_properties.is_some() {
            return Err(QueryError::attribute(
                "neighbors and returnProperties cannot be combined",
            ));
        }
        if let Some(neighbors) = spec.neighbors {
            if neighbors > config.max_neighbors {
                return Err(QueryError::attribute(format!(
                    "neighbors ({neighbors}) exceeds the maximum ({})",
                    config.max_neighbors
                )));
            }
        }
        if let Some(limit) = spec.limit {
            if limit > config.max_limit {
                return Err(QueryError::attribute(format!(
                    "limit ({limit}) exceeds the maximum ({})",
                    config.max_limit
                )));
            }
        }

        let inner = QuerySpec {
            neighbors: None,
            return_properties: None,
            order_by: None,
            order_by_direction: None,
            skip: 0,
            limit: None,
            count: false,
            ..spec.clone()
        };
        let query = Subquery::parse(schema, config, &inner)?;

        let (target, model) = match &spec.target {
            TargetSpec::Class(class) => {
                let model = schema.require_model(class)?;
                (model.name.clone(), Some(model))
            }
            TargetSpec::Records(rids) => (format!("[{}]", rids.join(", ")), None),
        };

        let order_by = spec.order_by.clone().unwrap_or_default();
        if !order_by.is_empty() {
            match model {
                Some(model) => resolve_properties(schema, model, &order_by)?,
                None => resolve_untyped(&order_by)?,
            };
        }

        let projection = match (&spec.return_properties, spec.neighbors) {
            (Some(props), _) => Some(match model {
                Some(model) => resolve_properties(schema, model, props)?,
                None => resolve_untyped(props)?,
            }),
            (None, Some(depth)) if depth > 0 => Some(nested_projection(depth, !spec.history)),
            _ => None,
        };

        Ok(Self {
            target,
            query,
            options: WrapOptions {
                projection,
                order_by,
                order_by_direction: spec.order_by_direction,
                skip: spec.skip,
                limit: spec.limit,
                count: spec.count,
            },
            history: spec.history,
        })
    }

    /// Class name, or the bracketed record list, the query reads from.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether soft-deleted records are kept.
    pub fn history(&self) -> bool {
        self.history
    }

    /// Outer clauses that will be applied.
    pub fn options(&self) -> &WrapOptions {
        &self.options
    }

    /// Inner selection.
    pub fn subquery(&self) -> &Subquery {
        &self.query
    }

    /// Renders the statement with placeholders numbered from `param0`.
    pub fn to_statement(&self) -> CompiledStatement {
        wrap(self.query.to_statement(), &self.options)
    }

    /// Statement with literals substituted, for logs and diagnostics.
    pub fn display_string(&self) -> String {
        self.to_statement().display()
    }
}

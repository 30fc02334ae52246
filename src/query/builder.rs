//! Fluent construction of [`QuerySpec`]s from Rust code.

use crate::config::QueryConfig;
use crate::error::{QueryError, Result};
use crate::query::ast::Operator;
use crate::query::schema::SchemaProvider;
use crate::query::spec::{
    FilterSpec, LeafSpec, OperandSpec, QuerySpec, QueryType, SortDirection, TargetSpec,
};
use crate::query::statement::CompiledStatement;
use crate::query::traversal::Direction;
use crate::query::value::Value;
use crate::query::wrapper::WrapperQuery;

/// Fluent builder over [`QuerySpec`]. The first recorded error is reported by
/// [`QueryBuilder::build`]; later calls become no-ops.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    spec: QuerySpec,
    error: Option<QueryError>,
}

impl QueryBuilder {
    /// Starts a query over `class`.
    pub fn target(class: impl Into<String>) -> Self {
        Self {
            spec: QuerySpec::new(class),
            error: None,
        }
    }

    /// Starts an identity lookup of explicit record ids.
    pub fn records<I, S>(rids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            spec: QuerySpec {
                target: TargetSpec::Records(rids.into_iter().map(Into::into).collect()),
                ..QuerySpec::default()
            },
            error: None,
        }
    }

    /// Adds predicates; successive calls are conjoined.
    pub fn where_<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut PredicateBuilder),
    {
        if self.error.is_some() {
            return self;
        }
        match PredicateBuilder::build_group(PredicateMode::And, build) {
            Ok(filter) => {
                self.spec.filters = Some(match self.spec.filters.take() {
                    Some(FilterSpec::And(mut children)) => {
                        children.push(filter);
                        FilterSpec::And(children)
                    }
                    Some(existing) => FilterSpec::And(vec![existing, filter]),
                    None => filter,
                });
            }
            Err(err) => self.error = Some(err),
        }
        self
    }

    /// Follows `edges` in `direction` up to `depth` hops.
    pub fn neighborhood<I, S>(mut self, edges: I, direction: Direction, depth: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.query_type = Some(QueryType::Neighborhood);
        self.spec.edges = Some(edges.into_iter().map(Into::into).collect());
        self.spec.direction = Some(direction);
        self.spec.depth = Some(depth);
        self
    }

    /// Walks outgoing `edges` from the selected records.
    pub fn descendants<I, S>(self, edges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.walk(QueryType::Descendants, edges)
    }

    /// Walks incoming `edges` from the selected records.
    pub fn ancestors<I, S>(self, edges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.walk(QueryType::Ancestors, edges)
    }

    fn walk<I, S>(mut self, style: QueryType, edges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.query_type = Some(style);
        self.spec.edges = Some(edges.into_iter().map(Into::into).collect());
        self
    }

    /// Expands linked records `depth` levels in the projection.
    pub fn neighbors(mut self, depth: u32) -> Self {
        self.spec.neighbors = Some(depth);
        self
    }

    /// Restricts the returned properties.
    pub fn select<I, S>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.return_properties = Some(props.into_iter().map(Into::into).collect());
        self
    }

    /// Orders the rows by `props`.
    pub fn order_by<I, S>(mut self, props: I, direction: SortDirection) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.order_by = Some(props.into_iter().map(Into::into).collect());
        self.spec.order_by_direction = Some(direction);
        self
    }

    /// Rows to skip before returning.
    pub fn skip(mut self, skip: u64) -> Self {
        self.spec.skip = skip;
        self
    }

    /// Caps the number of rows.
    pub fn limit(mut self, limit: u64) -> Self {
        self.spec.limit = Some(limit);
        self
    }

    /// Keeps soft-deleted records.
    pub fn history(mut self) -> Self {
        self.spec.history = true;
        self
    }

    /// Returns the row count instead of the rows.
    pub fn count(mut self) -> Self {
        self.spec.count = true;
        self
    }

    /// Finishes the request.
    pub fn build(self) -> Result<QuerySpec> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.spec),
        }
    }

    /// Finishes and validates the request.
    pub fn parse(self, schema: &dyn SchemaProvider, config: &QueryConfig) -> Result<WrapperQuery> {
        WrapperQuery::parse(schema, config, &self.build()?)
    }

    /// Finishes, validates and renders the request.
    pub fn compile(
        self,
        schema: &dyn SchemaProvider,
        config: &QueryConfig,
    ) -> Result<CompiledStatement> {
        Ok(self.parse(schema, config)?.to_statement())
    }
}

#[derive(Clone, Copy, Debug)]
enum PredicateMode {
    And,
    Or,
}

/// Collects comparisons for one junction level.
pub struct PredicateBuilder {
    mode: PredicateMode,
    exprs: Vec<FilterSpec>,
    error: Option<QueryError>,
}

impl PredicateBuilder {
    fn with_mode(mode: PredicateMode) -> Self {
        Self {
            mode,
            exprs: Vec::new(),
            error: None,
        }
    }

    fn build_group<F>(mode: PredicateMode, build: F) -> Result<FilterSpec>
    where
        F: FnOnce(&mut PredicateBuilder),
    {
        let mut nested = PredicateBuilder::with_mode(mode);
        build(&mut nested);
        if let Some(err) = nested.error {
            return Err(err);
        }
        let mut exprs = nested.exprs;
        match exprs.len() {
            0 => Err(QueryError::attribute(
                "predicate group must contain at least one comparison",
            )),
            1 => Ok(exprs.remove(0)),
            _ => Ok(match nested.mode {
                PredicateMode::And => FilterSpec::And(exprs),
                PredicateMode::Or => FilterSpec::Or(exprs),
            }),
        }
    }

    fn push(
        &mut self,
        property: impl Into<String>,
        operator: Operator,
        value: OperandSpec,
        negate: bool,
    ) -> &mut Self {
        if self.error.is_none() {
            self.exprs.push(FilterSpec::Leaf(LeafSpec {
                property: property.into(),
                operator: Some(operator),
                value,
                negate,
            }));
        }
        self
    }

    fn push_value<P, V>(&mut self, property: P, operator: Operator, value: V) -> &mut Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        self.push(property, operator, OperandSpec::Value(value.into()), false)
    }

    /// `property = value`; a null value renders `IS NULL`.
    pub fn eq<P: Into<String>, V: Into<Value>>(&mut self, property: P, value: V) -> &mut Self {
        self.push_value(property, Operator::Eq, value)
    }

    /// `NOT (property = value)`.
    pub fn ne<P: Into<String>, V: Into<Value>>(&mut self, property: P, value: V) -> &mut Self {
        self.push(property, Operator::Eq, OperandSpec::Value(value.into()), true)
    }

    /// `property < value`.
    pub fn lt<P: Into<String>, V: Into<Value>>(&mut self, property: P, value: V) -> &mut Self {
        self.push_value(property, Operator::Lt, value)
    }

    /// `property <= value`.
    pub fn le<P: Into<String>, V: Into<Value>>(&mut self, property: P, value: V) -> &mut Self {
        self.push_value(property, Operator::Le, value)
    }

    /// `property > value`.
    pub fn gt<P: Into<String>, V: Into<Value>>(&mut self, property: P, value: V) -> &mut Self {
        self.push_value(property, Operator::Gt, value)
    }

    /// `property >= value`.
    pub fn ge<P: Into<String>, V: Into<Value>>(&mut self, property: P, value: V) -> &mut Self {
        self.push_value(property, Operator::Ge, value)
    }

    /// `property IN [values]`.
    pub fn in_list<P, I, V>(&mut self, property: P, values: I) -> &mut Self
    where
        P: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let list = Value::List(values.into_iter().map(Into::into).collect());
        self.push_value(property, Operator::In, list)
    }

    /// Collection property holds `value`.
    pub fn contains<P: Into<String>, V: Into<Value>>(&mut self, property: P, value: V) -> &mut Self {
        self.push_value(property, Operator::Contains, value)
    }

    /// Collection property holds every value.
    pub fn contains_all<P, I, V>(&mut self, property: P, values: I) -> &mut Self
    where
        P: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let list = Value::List(values.into_iter().map(Into::into).collect());
        self.push_value(property, Operator::ContainsAll, list)
    }

    /// Collection property holds at least one value.
    pub fn contains_any<P, I, V>(&mut self, property: P, values: I) -> &mut Self
    where
        P: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let list = Value::List(values.into_iter().map(Into::into).collect());
        self.push_value(property, Operator::ContainsAny, list)
    }

    /// Full-text match (`~`).
    pub fn text<P: Into<String>>(&mut self, property: P, term: &str) -> &mut Self {
        self.push_value(property, Operator::ContainsText, term)
    }

    /// Matches a link property against the records selected by `subquery`.
    pub fn in_subquery<P: Into<String>>(&mut self, property: P, subquery: QuerySpec) -> &mut Self {
        self.push(property, Operator::In, OperandSpec::Subquery(Box::new(subquery)), false)
    }

    /// Nested conjunction.
    pub fn and_group<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut PredicateBuilder),
    {
        self.group(PredicateMode::And, build)
    }

    /// Nested disjunction.
    pub fn or_group<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut PredicateBuilder),
    {
        self.group(PredicateMode::Or, build)
    }

    fn group<F>(&mut self, mode: PredicateMode, build: F) -> &mut Self
    where
        F: FnOnce(&mut PredicateBuilder),
    {
        if self.error.is_some() {
            return self;
        }
        match Self::build_group(mode, build) {
            Ok(expr) => self.exprs.push(expr),
            Err(err) => self.error = Some(err),
        }
        self
    }
}

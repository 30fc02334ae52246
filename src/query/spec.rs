//! Request shape accepted by the compiler.
//!
//! A [`QuerySpec`] is what a caller sends: camelCase JSON, unknown keys
//! rejected. Filters are written either as a flat map (implicit `AND`), as
//! `{"AND": [...]}` / `{"OR": [...]}` junctions, or as a single-property
//! object carrying `operator` / `negate`. An object value holding a `target`
//! key is a nested subquery.

#![allow(missing_docs)]

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::config::QueryConfig;
use crate::error::{QueryError, Result};
use crate::query::ast::{Filter, Operator};
use crate::query::filter::FilterBuilder;
use crate::query::schema::SchemaProvider;
use crate::query::subquery::Subquery;
use crate::query::traversal::Direction;
use crate::query::value::Value;

/// What a query selects from.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TargetSpec {
    /// Records of one class (subclasses included).
    Class(String),
    /// Explicit record ids (`#cluster:position`).
    Records(Vec<String>),
}

impl Default for TargetSpec {
    fn default() -> Self {
        TargetSpec::Class(String::new())
    }
}

impl From<&str> for TargetSpec {
    fn from(class: &str) -> Self {
        TargetSpec::Class(class.to_owned())
    }
}

/// Which traversal style a request asks for.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Depth-bounded pattern match in a chosen direction.
    Neighborhood,
    /// Walk along outgoing edges of the allowlist.
    Descendants,
    /// Walk along incoming edges of the allowlist.
    Ancestors,
}

/// Ordering direction of the outer query.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl SortDirection {
    /// Keyword emitted into the statement.
    pub fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// A complete query request.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QuerySpec {
    pub target: TargetSpec,
    #[serde(default)]
    pub filters: Option<FilterSpec>,
    #[serde(default)]
    pub neighbors: Option<u32>,
    #[serde(default)]
    pub query_type: Option<QueryType>,
    #[serde(default)]
    pub edges: Option<Vec<String>>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub depth: Option<u32>,
    #[serde(default)]
    pub return_properties: Option<Vec<String>>,
    #[serde(default)]
    pub order_by: Option<Vec<String>>,
    #[serde(default)]
    pub order_by_direction: Option<SortDirection>,
    #[serde(default)]
    pub skip: u64,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub history: bool,
    #[serde(default)]
    pub count: bool,
}

impl QuerySpec {
    /// Request selecting every active record of `class`.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            target: TargetSpec::Class(class.into()),
            ..Self::default()
        }
    }

    /// Parses a JSON request, reporting shape errors as [`QueryError::Attribute`].
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input)
            .map_err(|err| QueryError::attribute(format!("invalid query: {err}")))
    }

    /// Parses an already-decoded JSON request.
    pub fn from_value(value: JsonValue) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|err| QueryError::attribute(format!("invalid query: {err}")))
    }

    /// True when any field only meaningful on the outermost query is set.
    pub(crate) fn has_outer_options(&self) -> bool {
        self.neighbors.is_some()
            || self.return_properties.is_some()
            || self.order_by.is_some()
            || self.order_by_direction.is_some()
            || self.skip != 0
            || self.limit.is_some()
            || self.count
    }
}

/// Filter tree as written in a request.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterSpec {
    /// Single comparison.
    Leaf(LeafSpec),
    /// Every child must hold.
    And(Vec<FilterSpec>),
    /// At least one child must hold.
    Or(Vec<FilterSpec>),
}

/// Comparison as written in a request.
#[derive(Clone, Debug, PartialEq)]
pub struct LeafSpec {
    pub property: String,
    /// Explicit operator; inferred from the property and value when absent.
    pub operator: Option<Operator>,
    pub value: OperandSpec,
    pub negate: bool,
}

/// Right-hand side of a requested comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum OperandSpec {
    Value(Value),
    Subquery(Box<QuerySpec>),
}

impl FilterSpec {
    /// Equality leaf.
    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterSpec::Leaf(LeafSpec {
            property: property.into(),
            operator: None,
            value: OperandSpec::Value(value.into()),
            negate: false,
        })
    }

    /// Decodes the JSON filter forms described at module level.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        parse_filter(value).map_err(QueryError::attribute)
    }

    /// Validates the tree against `class` and lowers it to a [`Filter`].
    pub fn build(
        &self,
        schema: &dyn SchemaProvider,
        config: &QueryConfig,
        class: &str,
    ) -> Result<Filter> {
        let builder = FilterBuilder::new(schema.require_model(class)?, config);
        self.lower(&builder, schema, config)
    }

    fn lower(
        &self,
        builder: &FilterBuilder<'_>,
        schema: &dyn SchemaProvider,
        config: &QueryConfig,
    ) -> Result<Filter> {
        match self {
            FilterSpec::And(children) => Ok(FilterBuilder::and(
                children
                    .iter()
                    .map(|child| child.lower(builder, schema, config))
                    .collect::<Result<_>>()?,
            )),
            FilterSpec::Or(children) => Ok(FilterBuilder::or(
                children
                    .iter()
                    .map(|child| child.lower(builder, schema, config))
                    .collect::<Result<_>>()?,
            )),
            FilterSpec::Leaf(leaf) => match &leaf.value {
                OperandSpec::Value(value) => {
                    let operator = leaf
                        .operator
                        .unwrap_or_else(|| builder.default_operator(&leaf.property, value));
                    builder.leaf(&leaf.property, operator, value.clone(), leaf.negate)
                }
                OperandSpec::Subquery(spec) => {
                    let subquery = Subquery::parse(schema, config, spec)?;
                    let operator = leaf.operator.unwrap_or_else(|| {
                        match builder.model().property(&leaf.property) {
                            Some(def) if def.ty.is_iterable() => Operator::ContainsAny,
                            _ => Operator::In,
                        }
                    });
                    builder.leaf_subquery(&leaf.property, operator, subquery, leaf.negate)
                }
            },
        }
    }
}

impl<'de> Deserialize<'de> for FilterSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = JsonValue::deserialize(deserializer)?;
        parse_filter(raw).map_err(serde::de::Error::custom)
    }
}

fn parse_filter(value: JsonValue) -> std::result::Result<FilterSpec, String> {
    match value {
        JsonValue::Array(items) => Ok(FilterSpec::And(
            items.into_iter().map(parse_filter).collect::<std::result::Result<_, _>>()?,
        )),
        JsonValue::Object(map) => {
            if map.len() == 1 {
                if let Some((key, children)) = map.iter().next() {
                    if key == "AND" || key == "OR" {
                        let JsonValue::Array(items) = children.clone() else {
                            return Err(format!("{key} expects a list of filters"));
                        };
                        let children = items
                            .into_iter()
                            .map(parse_filter)
                            .collect::<std::result::Result<Vec<_>, _>>()?;
                        return Ok(if key == "AND" {
                            FilterSpec::And(children)
                        } else {
                            FilterSpec::Or(children)
                        });
                    }
                }
            }
            if map.contains_key("operator") || map.contains_key("negate") {
                return parse_explicit_leaf(map);
            }
            let mut leaves = map
                .into_iter()
                .map(|(property, value)| {
                    Ok(FilterSpec::Leaf(LeafSpec {
                        property,
                        operator: None,
                        value: parse_operand(value)?,
                        negate: false,
                    }))
                })
                .collect::<std::result::Result<Vec<_>, String>>()?;
            if leaves.len() == 1 {
                Ok(leaves.remove(0))
            } else {
                Ok(FilterSpec::And(leaves))
            }
        }
        other => Err(format!(
            "filters must be an object or a list, found {}",
            Value::from(other).kind()
        )),
    }
}

fn parse_explicit_leaf(
    mut map: serde_json::Map<String, JsonValue>,
) -> std::result::Result<FilterSpec, String> {
    let operator = match map.remove("operator") {
        Some(JsonValue::String(op)) => Some(op.parse::<Operator>().map_err(|err| err.to_string())?),
        Some(JsonValue::Null) | None => None,
        Some(_) => return Err("operator must be a string".to_owned()),
    };
    let negate = match map.remove("negate") {
        Some(JsonValue::Bool(flag)) => flag,
        Some(JsonValue::Null) | None => false,
        Some(_) => return Err("negate must be a boolean".to_owned()),
    };
    if map.len() != 1 {
        return Err(format!(
            "a filter with operator/negate must name exactly one property, found {}",
            map.len()
        ));
    }
    let Some((property, value)) = map.into_iter().next() else {
        return Err("missing filter property".to_owned());
    };
    Ok(FilterSpec::Leaf(LeafSpec {
        property,
        operator,
        value: parse_operand(value)?,
        negate,
    }))
}

fn parse_operand(value: JsonValue) -> std::result::Result<OperandSpec, String> {
    match value {
        JsonValue::Object(ref map) if map.contains_key("target") => {
            let spec: QuerySpec =
                serde_json::from_value(value).map_err(|err| format!("invalid subquery: {err}"))?;
            Ok(OperandSpec::Subquery(Box::new(spec)))
        }
        other => Ok(OperandSpec::Value(Value::from(other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_map_is_implicit_and() {
        let filter = FilterSpec::from_json(json!({"name": "kras", "sourceId": "3845"}))
            .expect("valid filter");
        let FilterSpec::And(children) = filter else {
            panic!("expected conjunction");
        };
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn single_key_map_is_a_leaf() {
        assert_eq!(
            FilterSpec::from_json(json!({"name": "blargh"})).expect("valid filter"),
            FilterSpec::eq("name", "blargh")
        );
    }

    #[test]
    fn explicit_operator_and_negation() {
        let filter = FilterSpec::from_json(json!({"name": "kras", "operator": "~", "negate": true}))
            .expect("valid filter");
        let FilterSpec::Leaf(leaf) = filter else {
            panic!("expected leaf");
        };
        assert_eq!(leaf.operator, Some(Operator::ContainsText));
        assert!(leaf.negate);
    }

    #[test]
    fn junction_keys_and_subqueries() {
        let filter = FilterSpec::from_json(json!({
            "OR": [
                {"name": "a"},
                {"source": {"target": "Source", "filters": {"name": "disease ontology"}}}
            ]
        }))
        .expect("valid filter");
        let FilterSpec::Or(children) = filter else {
            panic!("expected disjunction");
        };
        let FilterSpec::Leaf(leaf) = &children[1] else {
            panic!("expected leaf");
        };
        assert!(matches!(leaf.value, OperandSpec::Subquery(_)));
    }

    #[test]
    fn unknown_request_keys_are_rejected() {
        let err = QuerySpec::from_json(r#"{"target": "Disease", "colour": "red"}"#)
            .expect_err("unknown field");
        assert_eq!(err.code(), "AttributeError");
    }

    #[test]
    fn request_fields_are_camel_case() {
        let spec = QuerySpec::from_json(
            r#"{"target": "Disease", "returnProperties": ["name"], "orderByDirection": "DESC", "limit": 10}"#,
        )
        .expect("valid request");
        assert_eq!(spec.return_properties, Some(vec!["name".to_owned()]));
        assert_eq!(spec.order_by_direction, Some(SortDirection::Desc));
        assert_eq!(spec.limit, Some(10));
    }

    #[test]
    fn record_id_targets() {
        let spec = QuerySpec::from_json(r##"{"target": ["#12:0", "#13:4"]}"##).expect("valid");
        assert_eq!(
            spec.target,
            TargetSpec::Records(vec!["#12:0".into(), "#13:4".into()])
        );
    }
}

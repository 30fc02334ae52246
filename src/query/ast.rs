//! Boolean filter trees and their rendering to the store's expression syntax.
//!
//! Trees are built unvalidated here; [`crate::query::filter::FilterBuilder`]
//! is the schema-checked way to construct them. Rendering never interpolates a
//! literal: every value is replaced by a placeholder from the shared
//! [`ParamBinder`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::QueryError;
use crate::query::params::ParamBinder;
use crate::query::subquery::Subquery;
use crate::query::value::Value;

/// Comparison operators understood by the compiler.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Operator {
    /// Equality, or `IS NULL` against a null literal.
    Eq,
    /// Strict less-than.
    Lt,
    /// Less-than-or-equal.
    Le,
    /// Strict greater-than.
    Gt,
    /// Greater-than-or-equal.
    Ge,
    /// Set membership of a scalar property.
    In,
    /// Collection property holds the value.
    Contains,
    /// Collection property holds every listed value.
    ContainsAll,
    /// Collection property holds at least one listed value.
    ContainsAny,
    /// Full-text match against a text index (`~`).
    ContainsText,
}

impl Operator {
    /// Symbol accepted in requests.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::In => "IN",
            Operator::Contains => "CONTAINS",
            Operator::ContainsAll => "CONTAINSALL",
            Operator::ContainsAny => "CONTAINSANY",
            Operator::ContainsText => "~",
        }
    }

    /// Keyword emitted into the statement.
    pub fn keyword(self) -> &'static str {
        match self {
            Operator::ContainsText => "CONTAINSTEXT",
            other => other.symbol(),
        }
    }

    /// Operators whose operand must be a list.
    pub fn takes_list(self) -> bool {
        matches!(
            self,
            Operator::In | Operator::ContainsAll | Operator::ContainsAny
        )
    }

    /// Range comparisons.
    pub fn is_range(self) -> bool {
        matches!(self, Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let op = match input.trim().to_ascii_uppercase().as_str() {
            "=" | "==" => Operator::Eq,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "IN" => Operator::In,
            "CONTAINS" => Operator::Contains,
            "CONTAINSALL" => Operator::ContainsAll,
            "CONTAINSANY" => Operator::ContainsAny,
            "~" | "CONTAINSTEXT" => Operator::ContainsText,
            _ => {
                return Err(QueryError::attribute(format!(
                    "unsupported operator ({input})"
                )))
            }
        };
        Ok(op)
    }
}

impl Serialize for Operator {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Right-hand side of a comparison.
#[derive(Clone, Debug)]
pub enum Operand {
    /// Literal bound through a placeholder.
    Value(Value),
    /// Nested selection whose records the property is matched against.
    Subquery(Box<Subquery>),
}

/// Leaf comparison against a single property.
#[derive(Clone, Debug)]
pub struct Comparison {
    /// Property name (`@rid` and `@class` included).
    pub property: String,
    /// Comparison operator.
    pub operator: Operator,
    /// Bound literal or nested subquery.
    pub operand: Operand,
    /// Wraps the comparison in `NOT (...)`.
    pub negate: bool,
}

impl Comparison {
    /// Equality comparison against a literal.
    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            operator: Operator::Eq,
            operand: Operand::Value(value.into()),
            negate: false,
        }
    }

    /// `property IS NULL`.
    pub fn is_null(property: impl Into<String>) -> Self {
        Self::eq(property, Value::Null)
    }

    fn render(&self, binder: &mut ParamBinder) -> String {
        let body = match &self.operand {
            Operand::Value(Value::Null) if self.operator == Operator::Eq => {
                format!("{} IS NULL", self.property)
            }
            Operand::Value(value) => {
                let name = binder.bind(value.clone());
                format!("{} {} :{name}", self.property, self.operator.keyword())
            }
            Operand::Subquery(subquery) => {
                let keyword = match self.operator {
                    Operator::Eq => Operator::In.keyword(),
                    other => other.keyword(),
                };
                let inner = subquery.compile(binder);
                format!("{} {keyword} ({inner})", self.property)
            }
        };
        if self.negate {
            format!("NOT ({body})")
        } else {
            body
        }
    }
}

/// Boolean expression tree over comparisons.
#[derive(Clone, Debug)]
pub enum Filter {
    /// Comparison leaf.
    Cmp(Comparison),
    /// Conjunction.
    And(Vec<Filter>),
    /// Disjunction.
    Or(Vec<Filter>),
}

impl Filter {
    /// Renders the tree, binding every literal through `binder`.
    ///
    /// Junctions with more than one rendered child are parenthesized; a
    /// single-child junction renders as its child; an empty junction renders
    /// as `None`.
    pub fn render(&self, binder: &mut ParamBinder) -> Option<String> {
        match self {
            Filter::Cmp(cmp) => Some(cmp.render(binder)),
            Filter::And(children) => render_junction(children, "AND", binder),
            Filter::Or(children) => render_junction(children, "OR", binder),
        }
    }

    /// True when the tree renders as a parenthesized group.
    pub fn renders_grouped(&self) -> bool {
        match self {
            Filter::Cmp(_) => false,
            Filter::And(children) | Filter::Or(children) => {
                let non_empty: Vec<_> = children.iter().filter(|c| !c.is_empty()).collect();
                match non_empty.as_slice() {
                    [] => false,
                    [only] => only.renders_grouped(),
                    _ => true,
                }
            }
        }
    }

    /// True when the tree holds no comparison at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Filter::Cmp(_) => false,
            Filter::And(children) | Filter::Or(children) => children.iter().all(Filter::is_empty),
        }
    }

    /// Number of comparison leaves, nested subqueries excluded.
    pub fn leaf_count(&self) -> usize {
        match self {
            Filter::Cmp(_) => 1,
            Filter::And(children) | Filter::Or(children) => {
                children.iter().map(Filter::leaf_count).sum()
            }
        }
    }

    /// Conjoins `other` onto this tree, flattening an existing conjunction.
    pub fn and_also(self, other: Filter) -> Filter {
        match self {
            Filter::And(mut children) => {
                children.push(other);
                Filter::And(children)
            }
            existing => Filter::And(vec![existing, other]),
        }
    }
}

impl From<Comparison> for Filter {
    fn from(cmp: Comparison) -> Self {
        Filter::Cmp(cmp)
    }
}

fn render_junction(children: &[Filter], joiner: &str, binder: &mut ParamBinder) -> Option<String> {
    let parts: Vec<String> = children
        .iter()
        .filter_map(|child| child.render(binder))
        .collect();
    match parts.len() {
        0 => None,
        1 => parts.into_iter().next(),
        _ => Some(format!("({})", parts.join(&format!(" {joiner} ")))),
    }
}

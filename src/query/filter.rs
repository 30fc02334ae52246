//! Schema-checked construction of filter trees.

use crate::config::QueryConfig;
use crate::error::{QueryError, Result};
use crate::query::ast::{Comparison, Filter, Operand, Operator};
use crate::query::schema::{ClassModel, PropertyDef, PropertyType};
use crate::query::subquery::Subquery;
use crate::query::value::Value;

/// Identity attributes every record exposes regardless of its class.
const IDENTITY_ATTRIBUTES: [(&str, PropertyType); 2] =
    [("@rid", PropertyType::Link), ("@class", PropertyType::String)];

/// Builds comparisons against one class, rejecting anything the schema or
/// the configured limits do not allow.
pub struct FilterBuilder<'a> {
    model: &'a ClassModel,
    config: &'a QueryConfig,
}

impl<'a> FilterBuilder<'a> {
    /// Creates a builder validating against `model`.
    pub fn new(model: &'a ClassModel, config: &'a QueryConfig) -> Self {
        Self { model, config }
    }

    /// Class the builder validates against.
    pub fn model(&self) -> &'a ClassModel {
        self.model
    }

    /// Validated comparison of `property` against a literal.
    pub fn leaf(
        &self,
        property: &str,
        operator: Operator,
        value: impl Into<Value>,
        negate: bool,
    ) -> Result<Filter> {
        let value = value.into();
        let def = self.property(property)?;
        self.check_value(property, def.ty, operator, &value)?;
        Ok(Filter::Cmp(Comparison {
            property: property.to_owned(),
            operator,
            operand: Operand::Value(value),
            negate,
        }))
    }

    /// Validated comparison of a link property against a nested subquery.
    pub fn leaf_subquery(
        &self,
        property: &str,
        operator: Operator,
        subquery: Subquery,
        negate: bool,
    ) -> Result<Filter> {
        let def = self.property(property)?;
        let allowed = match def.ty {
            PropertyType::Link => matches!(operator, Operator::Eq | Operator::In),
            PropertyType::LinkList | PropertyType::LinkSet => {
                matches!(operator, Operator::ContainsAll | Operator::ContainsAny)
            }
            PropertyType::Any => true,
            _ => false,
        };
        if !allowed {
            return Err(QueryError::attribute(format!(
                "subquery values are not supported for the property ({property}) with operator ({operator})"
            )));
        }
        Ok(Filter::Cmp(Comparison {
            property: property.to_owned(),
            operator,
            operand: Operand::Subquery(Box::new(subquery)),
            negate,
        }))
    }

    /// Conjunction of `children`.
    pub fn and(children: Vec<Filter>) -> Filter {
        Filter::And(children)
    }

    /// Disjunction of `children`.
    pub fn or(children: Vec<Filter>) -> Filter {
        Filter::Or(children)
    }

    /// Picks the operator used when a request leaves it out.
    pub fn default_operator(&self, property: &str, value: &Value) -> Operator {
        let iterable = self
            .model
            .property(property)
            .map(|def| def.ty.is_iterable())
            .unwrap_or(false);
        match value {
            Value::List(_) if iterable => Operator::ContainsAll,
            Value::List(_) => Operator::In,
            Value::String(_) | Value::Int(_) | Value::Float(_) | Value::Bool(_) if iterable => {
                Operator::Contains
            }
            _ => Operator::Eq,
        }
    }

    fn property(&self, name: &str) -> Result<PropertyDef> {
        if let Some((_, ty)) = IDENTITY_ATTRIBUTES.iter().find(|(attr, _)| *attr == name) {
            return Ok(PropertyDef::new(*ty));
        }
        self.model.require_property(name).cloned()
    }

    fn check_value(
        &self,
        property: &str,
        ty: PropertyType,
        operator: Operator,
        value: &Value,
    ) -> Result<()> {
        let incompatible = || {
            QueryError::attribute(format!(
                "operator ({operator}) is not compatible with the property ({property}) of type ({ty:?}) and value of type ({})",
                value.kind()
            ))
        };
        match operator {
            Operator::Eq => {
                let fits = match value {
                    Value::List(_) => ty.is_iterable(),
                    _ => ty.accepts(value),
                };
                if !fits {
                    return Err(incompatible());
                }
            }
            Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
                if !ty.is_orderable() || value.is_null() || !ty.accepts(value) {
                    return Err(incompatible());
                }
            }
            Operator::In => {
                let Value::List(items) = value else {
                    return Err(incompatible());
                };
                if ty.is_iterable() && ty != PropertyType::Any {
                    return Err(incompatible());
                }
                if items.iter().any(|item| !ty.accepts(item)) {
                    return Err(incompatible());
                }
            }
            Operator::Contains => {
                if !ty.is_iterable() || matches!(value, Value::List(_)) {
                    return Err(incompatible());
                }
            }
            Operator::ContainsAll | Operator::ContainsAny => {
                if !ty.is_iterable() || !matches!(value, Value::List(_)) {
                    return Err(incompatible());
                }
            }
            Operator::ContainsText => {
                let text = match (ty, value) {
                    (PropertyType::String | PropertyType::Any, Value::String(text)) => text,
                    _ => return Err(incompatible()),
                };
                self.check_words(text)?;
            }
        }
        Ok(())
    }

    fn check_words(&self, text: &str) -> Result<()> {
        let min = self.config.min_word_size;
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Err(QueryError::attribute(
                "full-text search term must contain at least one word",
            ));
        }
        if let Some(short) = words.iter().find(|word| word.chars().count() < min) {
            return Err(QueryError::attribute(format!(
                "Word \"{short}\" is too short to query with ~ operator. Must be at least {min} letters after splitting on whitespace characters"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::params::ParamBinder;
    use crate::query::schema::{ClassDecl, InMemorySchema, SchemaProvider};

    fn schema() -> InMemorySchema {
        InMemorySchema::new()
            .with_class(
                ClassDecl::new("Disease")
                    .property("name", PropertyDef::new(PropertyType::String))
                    .property("subsets", PropertyDef::new(PropertyType::EmbeddedSet))
                    .property("version", PropertyDef::new(PropertyType::Integer))
                    .property(
                        "source",
                        PropertyDef::link(PropertyType::Link, "Source"),
                    ),
            )
            .expect("schema")
    }

    #[test]
    fn leaf_on_unknown_property_fails() {
        let schema = schema();
        let config = QueryConfig::default();
        let builder = FilterBuilder::new(schema.model("Disease").unwrap(), &config);
        let err = builder
            .leaf("colour", Operator::Eq, "red", false)
            .expect_err("unknown property");
        assert_eq!(err.code(), "AttributeError");
    }

    #[test]
    fn containment_requires_iterable_property() {
        let schema = schema();
        let config = QueryConfig::default();
        let builder = FilterBuilder::new(schema.model("Disease").unwrap(), &config);
        assert!(builder
            .leaf("name", Operator::ContainsAny, vec!["a", "b"], false)
            .is_err());
        assert!(builder
            .leaf("subsets", Operator::ContainsAny, vec!["a", "b"], false)
            .is_ok());
        assert!(builder
            .leaf("version", Operator::Gt, "three", false)
            .is_err());
    }

    #[test]
    fn list_equality_needs_a_collection_property() {
        let schema = schema();
        let config = QueryConfig::default();
        let builder = FilterBuilder::new(schema.model("Disease").unwrap(), &config);
        let err = builder
            .leaf("name", Operator::Eq, vec!["a", "b"], false)
            .expect_err("list against a string");
        assert_eq!(err.code(), "AttributeError");
        assert!(err.to_string().contains("(name)"), "{err}");
        assert!(builder
            .leaf("subsets", Operator::Eq, vec!["a", "b"], false)
            .is_ok());
    }

    #[test]
    fn short_fuzzy_words_are_rejected() {
        let schema = schema();
        let config = QueryConfig::default();
        let builder = FilterBuilder::new(schema.model("Disease").unwrap(), &config);
        let err = builder
            .leaf("name", Operator::ContainsText, "kras g12", false)
            .expect_err("g12 shorter than 4");
        assert!(err.to_string().contains("too short"));
        assert!(builder
            .leaf("name", Operator::ContainsText, "kras braf", false)
            .is_ok());
    }

    #[test]
    fn identity_attributes_are_always_known() {
        let schema = schema();
        let config = QueryConfig::default();
        let builder = FilterBuilder::new(schema.model("Disease").unwrap(), &config);
        let filter = builder
            .leaf("@rid", Operator::Eq, "#12:0", false)
            .expect("rid filter");
        let mut binder = ParamBinder::new();
        assert_eq!(filter.render(&mut binder).as_deref(), Some("@rid = :param0"));
    }

    #[test]
    fn default_operator_follows_property_shape() {
        let schema = schema();
        let config = QueryConfig::default();
        let builder = FilterBuilder::new(schema.model("Disease").unwrap(), &config);
        let list = Value::from(vec!["a"]);
        assert_eq!(builder.default_operator("subsets", &list), Operator::ContainsAll);
        assert_eq!(builder.default_operator("name", &list), Operator::In);
        assert_eq!(
            builder.default_operator("subsets", &Value::from("a")),
            Operator::Contains
        );
        assert_eq!(builder.default_operator("name", &Value::from("a")), Operator::Eq);
    }
}

#![allow(missing_docs)]

//! Schema lookups used to validate targets, filters and projections.
//!
//! The metamodel itself lives outside this crate. Callers expose it through
//! [`SchemaProvider`]; [`InMemorySchema`] is a flattened implementation used by
//! the CLI and by tests.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::query::value::Value;

/// Declared storage type of a property.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Long,
    Double,
    Boolean,
    Datetime,
    Link,
    LinkList,
    LinkSet,
    Embedded,
    EmbeddedList,
    EmbeddedSet,
    EmbeddedMap,
    Any,
}

impl PropertyType {
    /// Types whose values are collections.
    pub fn is_iterable(self) -> bool {
        matches!(
            self,
            PropertyType::LinkList
                | PropertyType::LinkSet
                | PropertyType::EmbeddedList
                | PropertyType::EmbeddedSet
                | PropertyType::Any
        )
    }

    /// Types that support `<`, `<=`, `>`, `>=`.
    pub fn is_orderable(self) -> bool {
        matches!(
            self,
            PropertyType::String
                | PropertyType::Integer
                | PropertyType::Long
                | PropertyType::Double
                | PropertyType::Datetime
                | PropertyType::Any
        )
    }

    /// Types that reference other records.
    pub fn is_link(self) -> bool {
        matches!(
            self,
            PropertyType::Link | PropertyType::LinkList | PropertyType::LinkSet
        )
    }

    /// Whether a scalar literal of this shape can be compared to the property.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (PropertyType::Any, _) => true,
            (PropertyType::String, Value::String(_)) => true,
            (PropertyType::Integer | PropertyType::Long | PropertyType::Datetime, Value::Int(_)) => {
                true
            }
            (PropertyType::Datetime, Value::String(_)) => true,
            (PropertyType::Double, Value::Int(_) | Value::Float(_)) => true,
            (PropertyType::Boolean, Value::Bool(_)) => true,
            (ty, Value::String(_)) if ty.is_link() => value.as_record_id().is_some(),
            (ty, Value::Map(_)) if ty.is_link() => value.as_record_id().is_some(),
            (PropertyType::Embedded | PropertyType::EmbeddedMap, Value::Map(_)) => true,
            (ty, _) if ty.is_iterable() => true,
            _ => false,
        }
    }
}

/// Property declaration on a class.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Storage type.
    #[serde(rename = "type")]
    pub ty: PropertyType,
    /// Class of the linked records, for link properties.
    #[serde(default, rename = "linkedClass", skip_serializing_if = "Option::is_none")]
    pub linked_class: Option<String>,
}

impl PropertyDef {
    /// Declares a property of the given type.
    pub fn new(ty: PropertyType) -> Self {
        Self {
            ty,
            linked_class: None,
        }
    }

    /// Declares a link property pointing at `class`.
    pub fn link(ty: PropertyType, class: impl Into<String>) -> Self {
        Self {
            ty,
            linked_class: Some(class.into()),
        }
    }
}

/// Index declaration on a class.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name.
    pub name: String,
    /// Indexed properties, in index order.
    pub properties: Vec<String>,
    /// Whether the index enforces uniqueness.
    #[serde(default)]
    pub unique: bool,
    /// Whether the index only covers active (not soft-deleted) records.
    #[serde(default)]
    pub active: bool,
}

/// Class (entity type) as seen by the query compiler.
///
/// `properties` already contains inherited properties and `inherits` lists
/// every ancestor, nearest first.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClassModel {
    /// Class name.
    pub name: String,
    /// Own and inherited properties.
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDef>,
    /// Transitive supertypes.
    #[serde(default)]
    pub inherits: Vec<String>,
    /// Index declarations.
    #[serde(default)]
    pub indices: Vec<IndexDef>,
    /// Abstract classes hold no records of their own.
    #[serde(default, rename = "isAbstract")]
    pub is_abstract: bool,
    /// Embedded classes are never queried directly.
    #[serde(default)]
    pub embedded: bool,
}

impl ClassModel {
    /// Looks up a property, inherited ones included.
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.get(name)
    }

    /// Looks up a property or fails with an [`QueryError::Attribute`].
    pub fn require_property(&self, name: &str) -> Result<&PropertyDef> {
        self.property(name).ok_or_else(|| {
            QueryError::attribute(format!(
                "property ({name}) is not defined on the class ({})",
                self.name
            ))
        })
    }

    /// True when `ancestor` is this class or one of its supertypes.
    pub fn is_a(&self, ancestor: &str) -> bool {
        self.name == ancestor || self.inherits.iter().any(|name| name == ancestor)
    }

    /// Properties covered by active unique indices, in declaration order.
    pub fn active_properties(&self) -> Option<Vec<String>> {
        let mut seen = BTreeSet::new();
        let mut props = Vec::new();
        for index in self.indices.iter().filter(|idx| idx.active && idx.unique) {
            for prop in &index.properties {
                if seen.insert(prop.clone()) {
                    props.push(prop.clone());
                }
            }
        }
        (!props.is_empty()).then_some(props)
    }
}

/// Provides class lookups for the query compiler.
pub trait SchemaProvider {
    /// Returns the model for `name`, if the class exists.
    fn model(&self, name: &str) -> Option<&ClassModel>;

    /// Names of every class known to the schema.
    fn class_names(&self) -> Vec<String>;

    /// Looks up a class or fails with an [`QueryError::Attribute`].
    fn require_model(&self, name: &str) -> Result<&ClassModel> {
        self.model(name)
            .ok_or_else(|| QueryError::attribute(format!("Invalid target class ({name})")))
    }

    /// Concrete, non-embedded classes without subclasses.
    fn terminal_classes(&self) -> Vec<String> {
        let names = self.class_names();
        let mut parents = BTreeSet::new();
        for name in &names {
            if let Some(model) = self.model(name) {
                parents.extend(model.inherits.iter().cloned());
            }
        }
        names
            .into_iter()
            .filter(|name| {
                self.model(name)
                    .map(|m| !m.is_abstract && !m.embedded && !parents.contains(name))
                    .unwrap_or(false)
            })
            .collect()
    }
}

/// Class declaration as written in a schema document.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ClassDecl {
    /// Class name.
    pub name: String,
    /// Direct supertypes.
    #[serde(default)]
    pub inherits: Vec<String>,
    /// Own properties.
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDef>,
    /// Own indices.
    #[serde(default)]
    pub indices: Vec<IndexDef>,
    /// Abstract flag.
    #[serde(default, rename = "isAbstract")]
    pub is_abstract: bool,
    /// Embedded flag.
    #[serde(default)]
    pub embedded: bool,
}

impl ClassDecl {
    /// Starts a declaration for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a direct supertype.
    pub fn inherits(mut self, parent: impl Into<String>) -> Self {
        self.inherits.push(parent.into());
        self
    }

    /// Adds an own property.
    pub fn property(mut self, name: impl Into<String>, def: PropertyDef) -> Self {
        self.properties.insert(name.into(), def);
        self
    }

    /// Adds an index.
    pub fn index(mut self, index: IndexDef) -> Self {
        self.indices.push(index);
        self
    }

    /// Marks the class abstract.
    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Marks the class embedded.
    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }
}

/// In-memory schema with inheritance flattened at registration time.
#[derive(Clone, Debug, Default)]
pub struct InMemorySchema {
    classes: BTreeMap<String, ClassModel>,
}

impl InMemorySchema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class. Supertypes must already be registered.
    pub fn with_class(mut self, decl: ClassDecl) -> Result<Self> {
        self.insert(decl)?;
        Ok(self)
    }

    /// Parses a JSON array of [`ClassDecl`]s, in any order.
    pub fn from_json(input: &str) -> Result<Self> {
        let decls: Vec<ClassDecl> = serde_json::from_str(input)
            .map_err(|err| QueryError::attribute(format!("invalid schema document: {err}")))?;
        Self::from_decls(decls)
    }

    /// Registers declarations, resolving parents regardless of input order.
    pub fn from_decls(decls: Vec<ClassDecl>) -> Result<Self> {
        let mut schema = Self::new();
        let mut pending = decls;
        while !pending.is_empty() {
            let before = pending.len();
            let (ready, blocked): (Vec<_>, Vec<_>) = pending.into_iter().partition(|decl| {
                decl.inherits
                    .iter()
                    .all(|parent| schema.classes.contains_key(parent))
            });
            for decl in ready {
                schema.insert(decl)?;
            }
            if blocked.len() == before {
                let names: Vec<_> = blocked.iter().map(|d| d.name.as_str()).collect();
                return Err(QueryError::attribute(format!(
                    "unresolved or cyclic supertypes for classes ({})",
                    names.join(", ")
                )));
            }
            pending = blocked;
        }
        Ok(schema)
    }

    fn insert(&mut self, decl: ClassDecl) -> Result<()> {
        let mut properties = BTreeMap::new();
        let mut inherits = Vec::new();
        let mut indices = Vec::new();
        for parent_name in &decl.inherits {
            let parent = self.classes.get(parent_name).ok_or_else(|| {
                QueryError::attribute(format!(
                    "class ({}) inherits from unknown class ({parent_name})",
                    decl.name
                ))
            })?;
            properties.extend(parent.properties.clone());
            indices.extend(parent.indices.iter().cloned());
            for name in std::iter::once(&parent.name).chain(parent.inherits.iter()) {
                if !inherits.contains(name) {
                    inherits.push(name.clone());
                }
            }
        }
        properties.extend(decl.properties);
        indices.extend(decl.indices);
        self.classes.insert(
            decl.name.clone(),
            ClassModel {
                name: decl.name,
                properties,
                inherits,
                indices,
                is_abstract: decl.is_abstract,
                embedded: decl.embedded,
            },
        );
        Ok(())
    }
}

impl SchemaProvider for InMemorySchema {
    fn model(&self, name: &str) -> Option<&ClassModel> {
        self.classes.get(name)
    }

    fn class_names(&self) -> Vec<String> {
        self.classes.keys().cloned().collect()
    }
}

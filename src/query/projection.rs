//! Projection clauses for the outer query.

use crate::error::{QueryError, Result};
use crate::query::schema::{ClassModel, SchemaProvider};

/// Projection used when nothing else is requested.
pub const DEFAULT_PROJECTION: &str = "*";

const IDENTITY_ATTRIBUTES: [&str; 2] = ["@rid", "@class"];

#[derive(Default)]
struct Node {
    /// Requested on its own as well as through a dotted path.
    bare: bool,
    children: Vec<(String, Node)>,
}

impl Node {
    fn child(&mut self, name: &str) -> &mut Node {
        let pos = match self.children.iter().position(|(n, _)| n == name) {
            Some(pos) => pos,
            None => {
                self.children.push((name.to_owned(), Node::default()));
                self.children.len() - 1
            }
        };
        &mut self.children[pos].1
    }

    fn render(&self) -> String {
        self.children
            .iter()
            .map(|(name, node)| {
                if node.children.is_empty() {
                    name.clone()
                } else if node.bare {
                    format!("{name}, {name}:{{{}}}", node.render())
                } else {
                    format!("{name}:{{{}}}", node.render())
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Validates `props` against `model` and renders them as a projection list.
///
/// A dotted name (`source.name`) walks a link property into its linked class
/// and renders as a nested group (`source:{name}`). Names sharing a prefix
/// share one group; a link also requested by itself is kept next to its group
/// (`source, source:{name}`).
pub fn resolve_properties(
    schema: &dyn SchemaProvider,
    model: &ClassModel,
    props: &[String],
) -> Result<String> {
    if props.is_empty() {
        return Err(QueryError::attribute("returnProperties must not be empty"));
    }
    let mut root = Node::default();
    for prop in props {
        let segments: Vec<&str> = prop.split('.').collect();
        let mut current = model;
        for (i, segment) in segments.iter().enumerate() {
            let last = i + 1 == segments.len();
            if IDENTITY_ATTRIBUTES.contains(segment) && last {
                break;
            }
            let def = current.require_property(segment)?;
            if last {
                break;
            }
            let linked = def
                .linked_class
                .as_deref()
                .filter(|_| def.ty.is_link())
                .ok_or_else(|| {
                    QueryError::attribute(format!(
                        "property ({segment}) of class ({}) is not a link and cannot be expanded in ({prop})",
                        current.name
                    ))
                })?;
            current = schema.require_model(linked)?;
        }
        let mut node = &mut root;
        for segment in segments {
            node = node.child(segment);
        }
        node.bare = true;
    }
    Ok(root.render())
}

/// Checks bare property names when no class model is available (record id
/// targets). Only plain identifiers and identity attributes pass.
pub fn resolve_untyped(props: &[String]) -> Result<String> {
    if props.is_empty() {
        return Err(QueryError::attribute("returnProperties must not be empty"));
    }
    for prop in props {
        let plain = !prop.is_empty()
            && prop
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !prop.starts_with(|c: char| c.is_ascii_digit());
        if !plain && !IDENTITY_ATTRIBUTES.contains(&prop.as_str()) {
            return Err(QueryError::attribute(format!(
                "invalid property name ({prop})"
            )));
        }
    }
    Ok(props.join(", "))
}

/// Fetch plan expanding linked records `depth` levels deep.
///
/// Each level selects `*, @rid, @class`; `exclude_history` drops the
/// `history` link at every level.
pub fn nested_projection(depth: u32, exclude_history: bool) -> String {
    let mut level = String::from("*, @rid, @class");
    if exclude_history {
        level.push_str(", !history");
    }
    if depth == 0 {
        level
    } else {
        format!("{level}, *:{{{}}}", nested_projection(depth - 1, exclude_history))
    }
}

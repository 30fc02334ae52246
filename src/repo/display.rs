//! Computed display names.
//!
//! Most classes display their stored `name`. Variants are named after the
//! records they link to, so resolving them is a two-phase protocol: plan from
//! the record content, run one bounded lookup of the linked records, then
//! finish the name from the lookup rows. [`fetch_display_name`] runs both
//! phases; the pieces are public so callers can batch lookups themselves.

use tracing::debug;

use crate::error::{QueryError, Result};
use crate::query::schema::SchemaProvider;
use crate::query::statement::CompiledStatement;
use crate::query::subquery::Subquery;
use crate::query::value::RecordId;
use crate::query::wrapper::{wrap, WrapOptions};
use crate::repo::executor::StatementExecutor;
use crate::repo::record::Record;
use crate::repo::select::{select, SelectOptions};

/// Variant classes whose names are synthesized from linked records.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VariantKind {
    /// `"<reference1> [and <reference2>] <type>"`.
    Category,
    /// Structured positional notation.
    Positional,
}

/// Outcome of the planning phase.
#[derive(Clone, Debug, PartialEq)]
pub enum DisplayNamePlan {
    /// Name known without touching the store.
    Resolved(Option<String>),
    /// Name needs the linked records first.
    Lookup(LinkedLookup),
}

/// Linked records a variant name is built from.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkedLookup {
    kind: VariantKind,
    type_rid: RecordId,
    reference1: RecordId,
    reference2: Option<RecordId>,
    content: Record,
}

impl DisplayNamePlan {
    /// Plans the display name of `content`, a record of class `class`.
    pub fn plan(schema: &dyn SchemaProvider, class: &str, content: &Record) -> Result<Self> {
        let model = schema.require_model(class)?;
        if model.name == "Statement" {
            return Ok(DisplayNamePlan::Resolved(None));
        }
        let kind = match model.name.as_str() {
            "CategoryVariant" if model.is_a("Variant") => Some(VariantKind::Category),
            "PositionalVariant" if model.is_a("Variant") => Some(VariantKind::Positional),
            _ => None,
        };
        let Some(kind) = kind else {
            return Ok(DisplayNamePlan::Resolved(content.name().map(str::to_owned)));
        };
        let required = |property: &str| {
            content.link(property).ok_or_else(|| {
                QueryError::attribute(format!(
                    "{} requires a {property} link to compute its display name",
                    model.name
                ))
            })
        };
        Ok(DisplayNamePlan::Lookup(LinkedLookup {
            kind,
            type_rid: required("type")?,
            reference1: required("reference1")?,
            reference2: content.link("reference2"),
            content: content.clone(),
        }))
    }
}

impl LinkedLookup {
    /// Distinct linked record ids, type first.
    pub fn rids(&self) -> Vec<RecordId> {
        let mut rids = vec![self.type_rid];
        for rid in std::iter::once(self.reference1).chain(self.reference2) {
            if !rids.contains(&rid) {
                rids.push(rid);
            }
        }
        rids
    }

    /// Statement fetching the names of the linked records.
    pub fn statement(&self) -> CompiledStatement {
        let inner = Subquery::records(self.rids(), true).to_statement();
        wrap(
            inner,
            &WrapOptions {
                projection: Some("@rid, displayName, name".to_owned()),
                ..WrapOptions::default()
            },
        )
    }

    /// Builds the name from the rows returned by [`LinkedLookup::statement`].
    pub fn finish(&self, rows: &[Record]) -> Result<Option<String>> {
        let name_of = |rid: RecordId| -> Result<String> {
            let row = rows
                .iter()
                .find(|row| row.rid == Some(rid))
                .ok_or_else(|| QueryError::NoRecordFound {
                    message: format!("linked record ({rid}) was not found"),
                    sql: Some(self.statement().display()),
                })?;
            Ok(row
                .get("displayName")
                .and_then(|v| v.as_str())
                .or_else(|| row.name())
                .map(str::to_owned)
                .unwrap_or_else(|| rid.to_string()))
        };
        let type_name = name_of(self.type_rid)?;
        let reference1 = name_of(self.reference1)?;
        let reference2 = self.reference2.map(name_of).transpose()?;
        let name = match self.kind {
            VariantKind::Category => match reference2 {
                Some(reference2) => format!("{reference1} and {reference2} {type_name}"),
                None => format!("{reference1} {type_name}"),
            },
            VariantKind::Positional => {
                positional_notation(&self.content, &type_name, &reference1, reference2.as_deref())
            }
        };
        Ok(Some(name))
    }
}

/// Notation of a positional variant: `KRAS:p.G12D`, `EGFR:p.E746_A750del`,
/// `(EWSR1,FLI1):fusion(e.7,e.4)`.
pub fn positional_notation(
    content: &Record,
    type_name: &str,
    reference1: &str,
    reference2: Option<&str>,
) -> String {
    let text = |name: &str| content.get(name).and_then(|v| v.as_str()).unwrap_or_default();
    let break1 = text("break1Repr");
    let break2 = text("break2Repr");
    let ref_seq = text("refSeq");
    let untemplated = text("untemplatedSeq");

    if let Some(reference2) = reference2 {
        let breaks = [break1, break2]
            .into_iter()
            .filter(|b| !b.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        return format!("({reference1},{reference2}):{type_name}({breaks})");
    }

    let position = if break2.is_empty() {
        break1.to_owned()
    } else {
        format!("{break1}_{}", strip_prefix(break2))
    };
    let change = match type_name {
        "substitution" => untemplated.to_owned(),
        "deletion" => format!("del{ref_seq}"),
        "insertion" => format!("ins{untemplated}"),
        "duplication" => format!("dup{ref_seq}"),
        "indel" | "delins" => format!("del{ref_seq}ins{untemplated}"),
        other => other.to_owned(),
    };
    format!("{reference1}:{position}{change}")
}

/// Drops a repeated coordinate prefix (`p.`, `c.`, `e.`, ...) from the end
/// break of a range.
fn strip_prefix(repr: &str) -> &str {
    match repr.split_once('.') {
        Some((prefix, rest)) if prefix.len() == 1 => rest,
        _ => repr,
    }
}

/// Resolves the display name of `content`, running the linked lookup when the
/// class needs one. Lookup failures propagate.
pub async fn fetch_display_name<E>(
    executor: &E,
    schema: &dyn SchemaProvider,
    class: &str,
    content: &Record,
) -> Result<Option<String>>
where
    E: StatementExecutor + ?Sized,
{
    let lookup = match DisplayNamePlan::plan(schema, class, content)? {
        DisplayNamePlan::Resolved(name) => return Ok(name),
        DisplayNamePlan::Lookup(lookup) => lookup,
    };
    let statement = lookup.statement();
    debug!(class, linked = lookup.rids().len(), "query.display_name.lookup");
    let rows = select(
        executor,
        &statement,
        SelectOptions {
            exactly_n: Some(lookup.rids().len()),
            history: true,
            viewer: None,
        },
    )
    .await?;
    lookup.finish(&rows)
}

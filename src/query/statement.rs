//! Compiled statement text plus its bound parameters.

use std::fmt;

use serde::Serialize;

use crate::query::params::ParamMap;
use crate::query::value::Value;

/// Statement ready to hand to an executor. Immutable once produced.
#[derive(Clone, Debug, Serialize)]
pub struct CompiledStatement {
    /// Statement text with `:paramN` placeholders.
    pub query: String,
    /// Values bound to the placeholders.
    pub params: ParamMap,
}

impl CompiledStatement {
    /// Bundles statement text and parameters.
    pub fn new(query: impl Into<String>, params: ParamMap) -> Self {
        Self {
            query: query.into(),
            params,
        }
    }

    /// Statement text with runs of whitespace collapsed to single spaces.
    pub fn normalized(&self) -> String {
        self.query.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Placeholder names in order of appearance in the text.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names = Vec::new();
        scan_placeholders(&self.query, |name| {
            names.push(name.to_owned());
            None
        });
        names
    }

    /// Statement text with every placeholder replaced by its JSON literal.
    ///
    /// For logs and error messages only; never send this to the store.
    pub fn display(&self) -> String {
        scan_placeholders(&self.query, |name| {
            self.params.get(name).map(display_value)
        })
    }
}

impl PartialEq for CompiledStatement {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized() && self.params == other.params
    }
}

impl fmt::Display for CompiledStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

fn display_value(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "?".to_owned())
}

/// Walks `text`, calling `replace` with every `paramN` placeholder name.
/// Returns the text with placeholders substituted where `replace` yields a value.
fn scan_placeholders<F>(text: &str, mut replace: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    const PREFIX: &str = ":param";
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(PREFIX) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + PREFIX.len()..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        let token_len = PREFIX.len() + digits;
        let token = &rest[pos..pos + token_len];
        if digits == 0 {
            out.push_str(token);
        } else {
            match replace(&token[1..]) {
                Some(literal) => out.push_str(&literal),
                None => out.push_str(token),
            }
        }
        rest = &rest[pos + token_len..];
    }
    out.push_str(rest);
    out
}

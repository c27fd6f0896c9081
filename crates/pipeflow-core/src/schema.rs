//! Schema identifiers.
//!
//! A `Schema` is referenced by URI almost everywhere in this crate; the two
//! special forms (`Any` and single-capital-letter generics) are the only
//! ones the engine itself has to reason about structurally.

use std::fmt;

/// An identifier for a record type, as it appears inside a pipe annotation.
///
/// `Any` and single-uppercase-letter generics are distinguished because the
/// engine has to special-case them (generics get resolved per-invocation,
/// `Any` never constrains binding); anything else is an opaque dotted name
/// resolved by the environment collaborator (out of scope here).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SchemaRef {
    /// Accepts anything; never constrains binding or generic resolution.
    Any,
    /// A single uppercase letter, matched structurally across a pipe's
    /// slots and output (e.g. `T`).
    Generic(char),
    /// A dotted schema name, e.g. `my_module.Customer`.
    Named(String),
}

impl SchemaRef {
    /// Parse a schema reference as it appears inside `F[S]`. A missing or
    /// empty reference defaults to `Any`, per the AnnotationParser's
    /// extraction rules.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => SchemaRef::Any,
            Some(s) if s.is_empty() => SchemaRef::Any,
            Some("Any") => SchemaRef::Any,
            Some(s) if is_generic_label(s) => {
                SchemaRef::Generic(s.chars().next().expect("checked non-empty"))
            }
            Some(s) => SchemaRef::Named(s.to_string()),
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, SchemaRef::Generic(_))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, SchemaRef::Any)
    }
}

/// A generic label is exactly one uppercase ASCII letter, e.g. `T` but not
/// `Any`, `T1`, or `t`.
pub fn is_generic_label(s: &str) -> bool {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.is_ascii_uppercase() && s != "Any",
        _ => false,
    }
}

impl fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaRef::Any => write!(f, "Any"),
            SchemaRef::Generic(c) => write!(f, "{c}"),
            SchemaRef::Named(s) => write!(f, "{s}"),
        }
    }
}

//! Transport-agnostic listing types: filter trees, sort keys, page requests,
//! cursors and the two response envelopes.
//!
//! Nothing in here talks to a store. Compilation of untrusted input into these
//! types lives in `listing-engine`.

pub mod ast {
    use std::cmp::Ordering;
    use std::fmt;

    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    /// A typed scalar (or list of scalars for `In`) carried by a filter
    /// condition or read from a record.
    ///
    /// Serialize-only. Values come from a typed parse against the schema's field
    /// kind; an untagged parse back from JSON would read a UUID-shaped string
    /// as `Uuid`.
    #[derive(Clone, Debug, PartialEq, Serialize)]
    #[serde(untagged)]
    pub enum Value {
        Null,
        Bool(bool),
        I64(i64),
        F64(f64),
        Uuid(Uuid),
        DateTime(DateTime<Utc>),
        String(String),
        List(Vec<Value>),
    }

    impl Value {
        /// Total order between values of compatible kinds. Integers and floats
        /// compare numerically; `Null` sorts before everything else.
        /// Returns `None` for incompatible kinds.
        pub fn compare(&self, other: &Value) -> Option<Ordering> {
            use Value as V;
            match (self, other) {
                (V::Null, V::Null) => Some(Ordering::Equal),
                (V::Null, _) => Some(Ordering::Less),
                (_, V::Null) => Some(Ordering::Greater),
                (V::Bool(a), V::Bool(b)) => Some(a.cmp(b)),
                (V::I64(a), V::I64(b)) => Some(a.cmp(b)),
                (V::F64(a), V::F64(b)) => Some(a.total_cmp(b)),
                (V::I64(a), V::F64(b)) => Some((*a as f64).total_cmp(b)),
                (V::F64(a), V::I64(b)) => Some(a.total_cmp(&(*b as f64))),
                (V::Uuid(a), V::Uuid(b)) => Some(a.cmp(b)),
                (V::DateTime(a), V::DateTime(b)) => Some(a.cmp(b)),
                (V::String(a), V::String(b)) => Some(a.cmp(b)),
                _ => None,
            }
        }

        pub fn kind_name(&self) -> &'static str {
            match self {
                Value::Null => "null",
                Value::Bool(_) => "bool",
                Value::I64(_) => "integer",
                Value::F64(_) => "number",
                Value::Uuid(_) => "uuid",
                Value::DateTime(_) => "datetime",
                Value::String(_) => "string",
                Value::List(_) => "list",
            }
        }
    }

    impl fmt::Display for Value {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Value::Null => f.write_str("null"),
                Value::Bool(b) => write!(f, "{b}"),
                Value::I64(i) => write!(f, "{i}"),
                Value::F64(x) => write!(f, "{x}"),
                Value::Uuid(u) => write!(f, "{}", u.as_hyphenated()),
                Value::DateTime(dt) => {
                    f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
                }
                Value::String(s) => f.write_str(s),
                Value::List(items) => {
                    f.write_str("[")?;
                    for (i, v) in items.iter().enumerate() {
                        if i > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{v}")?;
                    }
                    f.write_str("]")
                }
            }
        }
    }

    /// Closed set of filter operators.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum FilterOp {
        Eq,
        Ne,
        Gt,
        Gte,
        Lt,
        Lte,
        In,
        Contains,
        StartsWith,
    }

    impl FilterOp {
        pub fn as_str(&self) -> &'static str {
            match self {
                FilterOp::Eq => "eq",
                FilterOp::Ne => "ne",
                FilterOp::Gt => "gt",
                FilterOp::Gte => "gte",
                FilterOp::Lt => "lt",
                FilterOp::Lte => "lte",
                FilterOp::In => "in",
                FilterOp::Contains => "contains",
                FilterOp::StartsWith => "startswith",
            }
        }
    }

    /// One validated `field op value` leaf.
    ///
    /// For `Contains`/`StartsWith` the value is the trimmed needle (already
    /// lower-cased when `ignore_case` is set). It is NOT escaped: executors that
    /// feed it into LIKE or regex must escape it first.
    #[derive(Clone, Debug, PartialEq)]
    pub struct FilterCondition {
        pub field: String,
        pub op: FilterOp,
        pub value: Value,
        pub ignore_case: bool,
    }

    /// Filter tree. Built only by the condition builder from raw parameters.
    /// An empty `And` matches everything.
    #[derive(Clone, Debug, PartialEq)]
    pub enum FilterExpr {
        Condition(FilterCondition),
        And(Vec<FilterExpr>),
        Or(Vec<FilterExpr>),
    }

    impl FilterExpr {
        pub fn match_all() -> Self {
            FilterExpr::And(Vec::new())
        }

        /// Conjunction that collapses the trivial cases.
        pub fn all_of(mut parts: Vec<FilterExpr>) -> Self {
            if parts.len() == 1 {
                parts.remove(0)
            } else {
                FilterExpr::And(parts)
            }
        }

        /// Disjunction that collapses the single-branch case.
        pub fn any_of(mut parts: Vec<FilterExpr>) -> Self {
            if parts.len() == 1 {
                parts.remove(0)
            } else {
                FilterExpr::Or(parts)
            }
        }

        pub fn is_match_all(&self) -> bool {
            matches!(self, FilterExpr::And(parts) if parts.is_empty())
        }

        pub fn node_count(&self) -> usize {
            match self {
                FilterExpr::Condition(_) => 1,
                FilterExpr::And(parts) | FilterExpr::Or(parts) => {
                    1 + parts.iter().map(FilterExpr::node_count).sum::<usize>()
                }
            }
        }

        /// Visit every leaf, depth first.
        pub fn conditions(&self) -> Vec<&FilterCondition> {
            let mut out = Vec::new();
            fn walk<'a>(e: &'a FilterExpr, out: &mut Vec<&'a FilterCondition>) {
                match e {
                    FilterExpr::Condition(c) => out.push(c),
                    FilterExpr::And(parts) | FilterExpr::Or(parts) => {
                        parts.iter().for_each(|p| walk(p, out))
                    }
                }
            }
            walk(self, &mut out);
            out
        }
    }
}

pub mod cursor;
pub mod error;
pub mod facet;
pub mod page;
pub mod problem;
pub mod request;
pub mod sort;

pub use ast::{FilterCondition, FilterExpr, FilterOp, Value};
pub use cursor::{CursorCodec, CursorV1};
pub use error::{CursorError, Error, ValidationError};
pub use facet::{FacetCounts, FacetValue, Suggestions};
pub use page::{CursorPage, ListResult, OffsetPage};
pub use problem::Problem;
pub use request::{ListRequest, PageRequest, RawFilters, RawValue, SortSpec};
pub use sort::{OrderBy, SortDir, SortKey};

/// Read access to named fields of a record. The engine uses it to pull
/// sort-key values out of the last row of a page when building the next cursor.
pub trait FieldAccess {
    fn field(&self, name: &str) -> Option<Value>;
}

pub mod base64_url {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    pub fn encode(bytes: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
        URL_SAFE_NO_PAD.decode(s)
    }
}

#[cfg(test)]
mod tests;

use listing_core::{FilterExpr, Value};
use sha2::{Digest, Sha256};

/// Canonical textual form of a compiled filter. Two trees render the same
/// string iff they are structurally equal.
pub fn normalize_filter_for_hash(expr: &FilterExpr) -> String {
    fn value(v: &Value) -> String {
        match v {
            Value::String(s) => format!("{s:?}"),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(value).collect();
                format!("[{}]", inner.join(","))
            }
            other => format!("{}:{}", other.kind_name(), other),
        }
    }

    fn walk(expr: &FilterExpr) -> String {
        match expr {
            FilterExpr::Condition(c) => format!(
                "CMP({},{},{}{})",
                c.field,
                c.op.as_str().to_ascii_uppercase(),
                value(&c.value),
                if c.ignore_case { ",I" } else { "" }
            ),
            FilterExpr::And(parts) => {
                let inner: Vec<String> = parts.iter().map(walk).collect();
                format!("AND({})", inner.join(","))
            }
            FilterExpr::Or(parts) => {
                let inner: Vec<String> = parts.iter().map(walk).collect();
                format!("OR({})", inner.join(","))
            }
        }
    }

    walk(expr)
}

/// 16 hex chars (first 8 bytes of SHA-256). `None` for the match-all filter.
pub fn short_filter_hash(expr: &FilterExpr) -> Option<String> {
    if expr.is_match_all() {
        return None;
    }
    let mut hasher = Sha256::new();
    hasher.update(normalize_filter_for_hash(expr).as_bytes());
    let bytes = hasher.finalize();
    Some(hex::encode(&bytes[..8]))
}

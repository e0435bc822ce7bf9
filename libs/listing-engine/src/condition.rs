//! Raw filter parameters → validated [`FilterExpr`] tree.
//!
//! Parsing of the transport (query string, body) belongs to the caller. This
//! module only consumes the extracted `name -> value(s)` mapping, checks every
//! name against the resource schema and produces a tree that executors can
//! translate without further validation.

use chrono::Utc;
use listing_core::{FilterCondition, FilterExpr, FilterOp, RawFilters, RawValue, ValidationError, Value};

use crate::config::{EngineConfig, TextPolicy};
use crate::schema::{BoundsPolicy, FieldKind, FilterSpec, NumericBounds, ResourceSchema, SearchSpec};

pub type BuildResult<T> = Result<T, ValidationError>;

/// Compiles untrusted filter parameters for one resource.
///
/// Pure: the same input always yields a structurally equal tree.
#[derive(Clone, Copy, Debug)]
pub struct ConditionBuilder<'a> {
    schema: &'a ResourceSchema,
    text: &'a TextPolicy,
    max_in_values: usize,
}

impl<'a> ConditionBuilder<'a> {
    pub fn new(schema: &'a ResourceSchema, config: &'a EngineConfig) -> Self {
        Self {
            schema,
            text: &config.text,
            max_in_values: config.max_in_values,
        }
    }

    /// Compile the whole mapping into an `And` of per-parameter conditions,
    /// led by the schema's base filters. An empty mapping on a schema without
    /// base filters yields the match-all tree.
    pub fn compile(&self, raw: &RawFilters) -> BuildResult<FilterExpr> {
        let mut parts = self.base_parts();
        for (name, value) in raw {
            if let Some(search) = self.schema.search_spec() {
                if search.param.eq_ignore_ascii_case(name) {
                    parts.push(self.compile_search(search, name, value)?);
                    continue;
                }
            }
            let spec = self
                .schema
                .filter_spec(name)
                .ok_or_else(|| ValidationError::UnknownField(name.clone()))?;
            parts.push(self.compile_param(spec, name, value)?);
        }
        Ok(FilterExpr::all_of(parts))
    }

    fn base_parts(&self) -> Vec<FilterExpr> {
        self.schema
            .base_filters()
            .iter()
            .cloned()
            .map(FilterExpr::Condition)
            .collect()
    }

    fn compile_search(
        &self,
        search: &SearchSpec,
        param: &str,
        raw: &RawValue,
    ) -> BuildResult<FilterExpr> {
        let needle = self.text_needle(param, single(param, raw)?)?;
        let branches = search
            .fields
            .iter()
            .map(|field| {
                FilterExpr::Condition(FilterCondition {
                    field: field.clone(),
                    op: search.op,
                    value: Value::String(needle.clone()),
                    ignore_case: self.text.case_insensitive,
                })
            })
            .collect();
        Ok(FilterExpr::any_of(branches))
    }

    fn compile_param(&self, spec: &FilterSpec, param: &str, raw: &RawValue) -> BuildResult<FilterExpr> {
        let (value, ignore_case) = match spec.op {
            FilterOp::Contains | FilterOp::StartsWith => {
                if spec.kind != FieldKind::String {
                    return Err(ValidationError::InvalidValue {
                        field: param.to_string(),
                        expected: FieldKind::String.name(),
                    });
                }
                let needle = self.text_needle(param, single(param, raw)?)?;
                (Value::String(needle), self.text.case_insensitive)
            }
            FilterOp::In => (self.in_list(spec, param, raw)?, false),
            FilterOp::Eq | FilterOp::Ne | FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                let text = non_empty(param, single(param, raw)?)?;
                let mut value = parse_value(spec.kind, param, text)?;
                if let Some(bounds) = spec.bounds {
                    value = apply_bounds(param, value, bounds)?;
                }
                (value, false)
            }
        };

        Ok(FilterExpr::Condition(FilterCondition {
            field: spec.field.clone(),
            op: spec.op,
            value,
            ignore_case,
        }))
    }

    /// The base filters plus `field startswith <prefix>` under the text
    /// policy. Used for suggestions.
    pub fn compile_prefix(&self, field: &str, param: &str, prefix: &str) -> BuildResult<FilterExpr> {
        let needle = self.text_needle(param, prefix)?;
        let mut parts = self.base_parts();
        parts.push(FilterExpr::Condition(FilterCondition {
            field: field.to_string(),
            op: FilterOp::StartsWith,
            value: Value::String(needle),
            ignore_case: self.text.case_insensitive,
        }));
        Ok(FilterExpr::all_of(parts))
    }

    /// Trim, bound and case-normalize a `contains`/`startswith` needle.
    fn text_needle(&self, param: &str, raw: &str) -> BuildResult<String> {
        let trimmed = non_empty(param, raw)?;
        let (min, max) = self.text.len_bounds();
        // Stop counting once past the ceiling.
        let len = trimmed.chars().take(max + 1).count();
        if len < min {
            return Err(ValidationError::QueryTooShort {
                field: param.to_string(),
                min,
            });
        }
        if len > max {
            return Err(ValidationError::QueryTooLong {
                field: param.to_string(),
                max,
            });
        }
        Ok(if self.text.case_insensitive {
            trimmed.to_lowercase()
        } else {
            trimmed.to_string()
        })
    }

    /// Repeated parameters and comma-separated lists are both accepted.
    /// Fails as soon as the distinct count passes `max_in_values`, so the
    /// work done is bounded by that limit, not by the input size.
    fn in_list(&self, spec: &FilterSpec, param: &str, raw: &RawValue) -> BuildResult<Value> {
        let too_many = || ValidationError::TooManyValues {
            field: param.to_string(),
            max: self.max_in_values,
        };
        let mut values: Vec<Value> = Vec::new();
        for part in raw.values().into_iter().flat_map(|s| s.split(',')) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let mut v = parse_value(spec.kind, param, part)?;
            if let Some(bounds) = spec.bounds {
                v = apply_bounds(param, v, bounds)?;
            }
            if values.contains(&v) {
                continue;
            }
            if values.len() == self.max_in_values {
                return Err(too_many());
            }
            values.push(v);
        }
        if values.is_empty() {
            return Err(ValidationError::EmptyValue {
                field: param.to_string(),
            });
        }
        Ok(Value::List(values))
    }
}

fn single<'r>(param: &str, raw: &'r RawValue) -> BuildResult<&'r str> {
    match raw {
        RawValue::One(s) => Ok(s.as_str()),
        RawValue::Many(v) if v.len() == 1 => Ok(v[0].as_str()),
        RawValue::Many(v) if v.is_empty() => Err(ValidationError::EmptyValue {
            field: param.to_string(),
        }),
        RawValue::Many(_) => Err(ValidationError::TooManyValues {
            field: param.to_string(),
            max: 1,
        }),
    }
}

fn non_empty<'r>(param: &str, raw: &'r str) -> BuildResult<&'r str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyValue {
            field: param.to_string(),
        });
    }
    Ok(trimmed)
}

/* ---------- coercion ---------- */

/// Parse a trimmed raw string into a typed value of `kind`.
pub fn parse_value(kind: FieldKind, param: &str, s: &str) -> BuildResult<Value> {
    let invalid = || ValidationError::InvalidValue {
        field: param.to_string(),
        expected: kind.name(),
    };
    Ok(match kind {
        FieldKind::String => Value::String(s.to_string()),
        FieldKind::I64 => Value::I64(s.parse::<i64>().map_err(|_| invalid())?),
        FieldKind::F64 => {
            let f = s.parse::<f64>().map_err(|_| invalid())?;
            if !f.is_finite() {
                return Err(invalid());
            }
            Value::F64(f)
        }
        FieldKind::Bool => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => return Err(invalid()),
        },
        FieldKind::Uuid => Value::Uuid(s.parse::<uuid::Uuid>().map_err(|_| invalid())?),
        FieldKind::DateTimeUtc => Value::DateTime(
            chrono::DateTime::parse_from_rfc3339(s)
                .map_err(|_| invalid())?
                .with_timezone(&Utc),
        ),
    })
}

fn apply_bounds(param: &str, value: Value, bounds: NumericBounds) -> BuildResult<Value> {
    let n = match value {
        Value::I64(i) => i as f64,
        Value::F64(f) => f,
        // Bounds only constrain numbers.
        other => return Ok(other),
    };
    let below = bounds.min.filter(|min| n < *min);
    let above = bounds.max.filter(|max| n > *max);
    let Some(limit) = below.or(above) else {
        return Ok(value);
    };
    match bounds.policy {
        BoundsPolicy::Reject => Err(ValidationError::out_of_range(param, describe_bounds(bounds))),
        BoundsPolicy::Clamp => Ok(match value {
            Value::I64(_) => Value::I64(if below.is_some() {
                limit.ceil() as i64
            } else {
                limit.floor() as i64
            }),
            _ => Value::F64(limit),
        }),
    }
}

fn describe_bounds(bounds: NumericBounds) -> String {
    match (bounds.min, bounds.max) {
        (Some(min), Some(max)) => format!("must be between {min} and {max}"),
        (Some(min), None) => format!("must be >= {min}"),
        (None, Some(max)) => format!("must be <= {max}"),
        (None, None) => "unbounded".to_string(),
    }
}

/* ---------- pattern escaping ---------- */

/// Escape `%`, `_` and `\` for a SQL `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            c => out.push(c),
        }
    }
    out
}

/// `%needle%` pattern for SQL executors.
pub fn like_contains(s: &str) -> String {
    format!("%{}%", escape_like(s))
}

/// `needle%` pattern for SQL executors.
pub fn like_starts(s: &str) -> String {
    format!("{}%", escape_like(s))
}

/// Escape every regex metacharacter so the needle matches literally. Same
/// result as `regex::escape` for the patterns executors build.
pub fn escape_regex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(
            ch,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '#'
                | '&' | '-' | '~'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
#[path = "condition_tests.rs"]
mod condition_tests;

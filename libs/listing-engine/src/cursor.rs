//! Keyset pagination: cursor planning, the "strictly after" predicate and
//! next-cursor construction from the last retained record.

use std::cmp::Ordering;

use chrono::{SecondsFormat, Utc};
use listing_core::{
    CursorCodec, CursorError, CursorPage, CursorV1, Error, FieldAccess, OrderBy, SortDir, SortKey,
    ValidationError, Value,
};
use tracing::{debug, error};

use crate::schema::{FieldKind, ResourceSchema};

/// Lower bound for a seek window: `(k0, k1, ..) > (v0, v1, ..)` in sort order.
#[derive(Clone, Debug, PartialEq)]
pub struct CursorPredicate {
    keys: Vec<(SortKey, Value)>,
}

impl CursorPredicate {
    pub fn new(keys: Vec<(SortKey, Value)>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &[(SortKey, Value)] {
        &self.keys
    }

    /// Lexicographic, direction-aware, strictly after the last-seen tuple.
    /// For ASC: (k0 > v0) OR (k0 = v0 AND k1 > v1) OR ...
    /// For DESC the comparison on that key flips.
    pub fn admits<R: FieldAccess + ?Sized>(&self, record: &R) -> bool {
        for (key, seen) in &self.keys {
            let current = record.field(&key.field).unwrap_or(Value::Null);
            let ord = match current.compare(seen) {
                Some(o) => o,
                None => return false,
            };
            let ord = match key.dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            };
            match ord {
                Ordering::Greater => return true,
                Ordering::Less => return false,
                Ordering::Equal => continue,
            }
        }
        false
    }
}

/* ---------- cursor value encoding/decoding ---------- */

/// String form of a sort-key value stored in a cursor. `None` for values that
/// cannot anchor a cursor (nulls, lists).
pub fn encode_cursor_value(value: &Value) -> Option<String> {
    Some(match value {
        Value::String(s) => s.clone(),
        Value::I64(i) => i.to_string(),
        Value::F64(f) => ryu::Buffer::new().format(*f).to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Uuid(u) => u.to_string(),
        Value::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        Value::Null | Value::List(_) => return None,
    })
}

pub fn parse_cursor_value(kind: FieldKind, s: &str) -> Option<Value> {
    Some(match kind {
        FieldKind::String => Value::String(s.to_string()),
        FieldKind::I64 => Value::I64(s.parse().ok()?),
        FieldKind::F64 => {
            let f: f64 = s.parse().ok()?;
            if !f.is_finite() {
                return None;
            }
            Value::F64(f)
        }
        FieldKind::Bool => Value::Bool(s.parse().ok()?),
        FieldKind::Uuid => Value::Uuid(s.parse().ok()?),
        FieldKind::DateTimeUtc => Value::DateTime(
            chrono::DateTime::parse_from_rfc3339(s)
                .ok()?
                .with_timezone(&Utc),
        ),
    })
}

/* ---------- paginator ---------- */

#[derive(Clone, Debug, PartialEq)]
pub struct CursorPlan {
    pub after: Option<CursorPredicate>,
    pub limit: u64,
    /// `limit + 1`: the extra record only signals that more exist.
    pub fetch_limit: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct CursorPaginator<'a> {
    codec: &'a CursorCodec,
    max_limit: u64,
}

impl<'a> CursorPaginator<'a> {
    pub fn new(codec: &'a CursorCodec, max_limit: u64) -> Self {
        Self { codec, max_limit }
    }

    pub fn validate_limit(&self, limit: u64) -> Result<u64, ValidationError> {
        if limit < 1 || limit > self.max_limit {
            return Err(ValidationError::out_of_range(
                "limit",
                format!("must be between 1 and {}", self.max_limit),
            ));
        }
        Ok(limit)
    }

    /// Decode and check `token` against the request's resolved sort and filter.
    /// Any failure is `Error::InvalidCursor`; there is no fallback to the
    /// first page.
    pub fn plan(
        &self,
        token: Option<&str>,
        limit: u64,
        order: &OrderBy,
        filter_hash: Option<&str>,
        schema: &ResourceSchema,
    ) -> Result<CursorPlan, Error> {
        let limit = self.validate_limit(limit)?;
        let after = match token {
            None => None,
            Some(token) => Some(
                self.decode_predicate(token, order, filter_hash, schema)
                    .map_err(|e| {
                        debug!(error = %e, sort = %order.to_signed_tokens(), "rejected pagination cursor");
                        Error::from(e)
                    })?,
            ),
        };
        Ok(CursorPlan {
            after,
            limit,
            fetch_limit: limit + 1,
        })
    }

    fn decode_predicate(
        &self,
        token: &str,
        order: &OrderBy,
        filter_hash: Option<&str>,
        schema: &ResourceSchema,
    ) -> Result<CursorPredicate, CursorError> {
        let cursor = self.codec.decode(token)?;
        if !order.equals_signed_tokens(&cursor.s) {
            return Err(CursorError::SortMismatch);
        }
        if cursor.f.as_deref() != filter_hash {
            return Err(CursorError::FilterMismatch);
        }
        if cursor.k.len() != order.len() {
            return Err(CursorError::InvalidKeys);
        }

        let mut keys = Vec::with_capacity(cursor.k.len());
        for (index, (raw, key)) in cursor.k.iter().zip(order.keys()).enumerate() {
            let kind = schema.sort_kind(&key.field).ok_or(CursorError::InvalidFields)?;
            let value = parse_cursor_value(kind, raw).ok_or(CursorError::InvalidKeyValue {
                index,
                expected: kind.name(),
            })?;
            keys.push((key.clone(), value));
        }
        Ok(CursorPredicate::new(keys))
    }

    /// Truncate an over-fetched batch to `limit` and, when something was cut
    /// off, encode the next cursor from the last retained record.
    pub fn assemble<R: FieldAccess>(
        &self,
        mut records: Vec<R>,
        limit: u64,
        order: &OrderBy,
        filter_hash: Option<&str>,
    ) -> Result<CursorPage<R>, Error> {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let has_more = records.len() > limit;
        if has_more {
            records.truncate(limit);
        }

        let next_cursor = match (has_more, records.last()) {
            (true, Some(last)) => Some(self.codec.encode(&self.cursor_for(last, order, filter_hash)?)),
            _ => None,
        };

        Ok(CursorPage {
            items: records,
            next_cursor,
            has_more,
        })
    }

    fn cursor_for<R: FieldAccess>(
        &self,
        record: &R,
        order: &OrderBy,
        filter_hash: Option<&str>,
    ) -> Result<CursorV1, Error> {
        let mut k = Vec::with_capacity(order.len());
        for key in order.keys() {
            let encoded = record
                .field(&key.field)
                .as_ref()
                .and_then(encode_cursor_value);
            match encoded {
                Some(s) => k.push(s),
                None => {
                    error!(
                        field = %key.field,
                        "record has no encodable value for sort key; cannot build cursor"
                    );
                    return Err(Error::Storage);
                }
            }
        }
        Ok(CursorV1 {
            k,
            s: order.to_signed_tokens(),
            f: filter_hash.map(str::to_string),
        })
    }
}

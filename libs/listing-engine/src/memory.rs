//! In-memory [`QueryExecutor`] over a `Vec<R>`.
//!
//! Evaluates the compiled filter, the resolved sort and both window kinds the
//! same way a database executor would. Text matching is plain substring
//! comparison, so needles need no escaping here.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use listing_core::{FacetValue, FieldAccess, FilterCondition, FilterExpr, FilterOp, OrderBy, SortDir, Value};
use parking_lot::RwLock;

use crate::executor::{QueryContext, QueryExecutor, StoreError, StoreQuery, StoreResult, Window};

pub struct MemoryExecutor<R> {
    records: Arc<RwLock<Vec<R>>>,
    latency: Option<Duration>,
    execute_calls: AtomicUsize,
    count_calls: AtomicUsize,
}

impl<R> MemoryExecutor<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
            latency: None,
            execute_calls: AtomicUsize::new(0),
            count_calls: AtomicUsize::new(0),
        }
    }

    /// Delay every call by `latency`. Cancellation interrupts the delay, and a
    /// delay longer than the call's remaining budget ends in `Timeout`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Shared handle to the backing vector, for mutation between calls.
    pub fn records(&self) -> Arc<RwLock<Vec<R>>> {
        self.records.clone()
    }

    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(AtomicOrdering::SeqCst)
    }

    async fn simulate_latency(&self, ctx: &QueryContext) -> Result<(), StoreError> {
        if let Some(latency) = self.latency {
            let budget = ctx.remaining();
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(StoreError::Cancelled),
                _ = tokio::time::sleep(latency.min(budget)) => {}
            }
            if latency > budget {
                return Err(StoreError::Timeout);
            }
        }
        if ctx.cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        Ok(())
    }
}

#[async_trait]
impl<R> QueryExecutor<R> for MemoryExecutor<R>
where
    R: FieldAccess + Clone + Send + Sync + 'static,
{
    async fn execute(
        &self,
        query: &StoreQuery<'_>,
        ctx: &QueryContext,
    ) -> Result<StoreResult<R>, StoreError> {
        self.execute_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.simulate_latency(ctx).await?;

        let mut matched: Vec<R> = {
            let guard = self.records.read();
            guard
                .iter()
                .filter(|r| matches(query.filter, *r))
                .cloned()
                .collect()
        };
        matched.sort_by(|a, b| compare_records(query.sort, a, b));

        let total = query.with_total.then_some(matched.len() as u64);
        let records = match query.window {
            Window::Offset { skip, limit } => matched
                .into_iter()
                .skip(usize::try_from(*skip).unwrap_or(usize::MAX))
                .take(usize::try_from(*limit).unwrap_or(usize::MAX))
                .collect(),
            Window::Seek { after, limit } => matched
                .into_iter()
                .filter(|r| after.as_ref().map_or(true, |p| p.admits(r)))
                .take(usize::try_from(*limit).unwrap_or(usize::MAX))
                .collect(),
        };

        Ok(StoreResult { records, total })
    }

    async fn count_by(
        &self,
        filter: &FilterExpr,
        field: &str,
        ctx: &QueryContext,
    ) -> Result<Vec<FacetValue>, StoreError> {
        self.count_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.simulate_latency(ctx).await?;

        let mut groups: BTreeMap<String, u64> = BTreeMap::new();
        let guard = self.records.read();
        for record in guard.iter().filter(|r| matches(filter, *r)) {
            match record.field(field) {
                None | Some(Value::Null) => {}
                Some(Value::List(items)) => {
                    for item in items {
                        *groups.entry(item.to_string()).or_default() += 1;
                    }
                }
                Some(v) => *groups.entry(v.to_string()).or_default() += 1,
            }
        }
        Ok(groups
            .into_iter()
            .map(|(value, count)| FacetValue { value, count })
            .collect())
    }
}

/* ---------- evaluation ---------- */

pub fn matches<R: FieldAccess + ?Sized>(expr: &FilterExpr, record: &R) -> bool {
    match expr {
        FilterExpr::Condition(c) => condition_matches(c, record),
        FilterExpr::And(parts) => parts.iter().all(|p| matches(p, record)),
        FilterExpr::Or(parts) => parts.iter().any(|p| matches(p, record)),
    }
}

fn condition_matches<R: FieldAccess + ?Sized>(c: &FilterCondition, record: &R) -> bool {
    let actual = record.field(&c.field).unwrap_or(Value::Null);
    match c.op {
        FilterOp::Eq => any_scalar(&actual, |v| equal(v, &c.value)),
        FilterOp::Ne => !any_scalar(&actual, |v| equal(v, &c.value)),
        FilterOp::Gt => ordered(&actual, &c.value, |o| o == Ordering::Greater),
        FilterOp::Gte => ordered(&actual, &c.value, |o| o != Ordering::Less),
        FilterOp::Lt => ordered(&actual, &c.value, |o| o == Ordering::Less),
        FilterOp::Lte => ordered(&actual, &c.value, |o| o != Ordering::Greater),
        FilterOp::In => {
            let Value::List(wanted) = &c.value else {
                return false;
            };
            any_scalar(&actual, |v| wanted.iter().any(|w| equal(v, w)))
        }
        FilterOp::Contains | FilterOp::StartsWith => {
            let Value::String(needle) = &c.value else {
                return false;
            };
            any_scalar(&actual, |v| match v {
                Value::String(hay) => {
                    let hay = if c.ignore_case {
                        hay.to_lowercase()
                    } else {
                        hay.clone()
                    };
                    if c.op == FilterOp::Contains {
                        hay.contains(needle.as_str())
                    } else {
                        hay.starts_with(needle.as_str())
                    }
                }
                _ => false,
            })
        }
    }
}

/// List-valued fields (tags) match when any element does.
fn any_scalar(actual: &Value, pred: impl Fn(&Value) -> bool) -> bool {
    match actual {
        Value::List(items) => items.iter().any(pred),
        v => pred(v),
    }
}

fn equal(a: &Value, b: &Value) -> bool {
    a.compare(b) == Some(Ordering::Equal)
}

/// Null never satisfies an ordering comparison.
fn ordered(actual: &Value, expected: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    if matches!(actual, Value::Null) {
        return false;
    }
    actual.compare(expected).is_some_and(accept)
}

fn compare_records<R: FieldAccess>(order: &OrderBy, a: &R, b: &R) -> Ordering {
    for key in order.keys() {
        let va = a.field(&key.field).unwrap_or(Value::Null);
        let vb = b.field(&key.field).unwrap_or(Value::Null);
        let ord = va.compare(&vb).unwrap_or(Ordering::Equal);
        let ord = match key.dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

//! Port to the backing store.
//!
//! The engine hands the executor a compiled filter, the resolved sort and a
//! fetch window; the executor returns raw records. Implementations must honour
//! [`QueryContext::cancel`] and return `total` only when asked for it.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use listing_core::{FacetValue, FilterExpr, OrderBy};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cursor::CursorPredicate;

#[derive(Clone, Debug, PartialEq)]
pub enum Window {
    /// Page-numbered access.
    Offset { skip: u64, limit: u64 },
    /// Keyset access: records strictly after `after` in sort order.
    Seek {
        after: Option<CursorPredicate>,
        limit: u64,
    },
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Offset { skip, limit } => write!(f, "offset(skip={skip}, limit={limit})"),
            Window::Seek { after, limit } => {
                let mode = if after.is_some() { "after" } else { "start" };
                write!(f, "seek({mode}, limit={limit})")
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StoreQuery<'a> {
    pub filter: &'a FilterExpr,
    pub sort: &'a OrderBy,
    pub window: &'a Window,
    /// Compute the total number of matching records (offset mode only).
    pub with_total: bool,
}

#[derive(Clone, Debug)]
pub struct StoreResult<R> {
    pub records: Vec<R>,
    pub total: Option<u64>,
}

/// Cancellation and deadline propagated into every store call.
#[derive(Clone, Debug)]
pub struct QueryContext {
    pub cancel: CancellationToken,
    pub deadline: Instant,
}

impl QueryContext {
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self {
            cancel,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store call timed out")]
    Timeout,
    #[error("store call cancelled")]
    Cancelled,
    #[error("operation not supported by this store: {0}")]
    Unsupported(&'static str),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait QueryExecutor<R>: Send + Sync {
    async fn execute(
        &self,
        query: &StoreQuery<'_>,
        ctx: &QueryContext,
    ) -> Result<StoreResult<R>, StoreError>;

    /// Count matching records grouped by `field`.
    async fn count_by(
        &self,
        _filter: &FilterExpr,
        _field: &str,
        _ctx: &QueryContext,
    ) -> Result<Vec<FacetValue>, StoreError> {
        Err(StoreError::Unsupported("count_by"))
    }
}

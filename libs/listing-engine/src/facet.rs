//! TTL-bounded, single-flight cache for facet counts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use listing_core::FacetCounts;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tokio::time::Instant;

/// Key/TTL store backing the facet cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<FacetCounts>;
    async fn set(&self, key: &str, value: FacetCounts, ttl: Duration);
}

/// How often writes sweep out expired entries by default.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// In-process store. An expired entry is dropped when its key is read, and
/// writes sweep out every expired entry at most once per sweep interval.
pub struct MemoryCacheStore {
    entries: DashMap<String, (FacetCounts, Instant)>,
    sweep_interval: Duration,
    last_sweep: Mutex<Instant>,
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            last_sweep: Mutex::new(Instant::now()),
        }
    }
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
        *self.last_sweep.lock() = now;
        before.saturating_sub(self.entries.len())
    }

    fn sweep_due(&self, now: Instant) -> bool {
        now.duration_since(*self.last_sweep.lock()) >= self.sweep_interval
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Option<FacetCounts> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            let (value, expires_at) = entry.value();
            if *expires_at > now {
                return Some(value.clone());
            }
        }
        self.entries.remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        None
    }

    async fn set(&self, key: &str, value: FacetCounts, ttl: Duration) {
        let now = Instant::now();
        if self.sweep_due(now) {
            let dropped = self.purge_expired();
            if dropped > 0 {
                tracing::trace!(dropped, "swept expired facet entries");
            }
        }
        self.entries.insert(key.to_string(), (value, now + ttl));
    }
}

/// At most one computation per key is in flight; concurrent callers for the
/// same key wait for it and share its result.
pub struct FacetCache {
    store: Arc<dyn CacheStore>,
    inflight: DashMap<String, Arc<OnceCell<FacetCounts>>>,
}

impl FacetCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            inflight: DashMap::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCacheStore::new()))
    }

    /// Serve `key` from the store, or compute it once and store it for `ttl`.
    /// A failed computation is not cached; the next waiter retries.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<FacetCounts, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FacetCounts, E>>,
    {
        if let Some(hit) = self.store.get(key).await {
            return Ok(hit);
        }

        let cell = self
            .inflight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let result = cell
            .get_or_try_init(|| async {
                // A previous flight may have finished between the miss above
                // and registering on this cell.
                if let Some(hit) = self.store.get(key).await {
                    return Ok(hit);
                }
                let value = compute().await?;
                self.store.set(key, value.clone(), ttl).await;
                Ok(value)
            })
            .await
            .cloned();

        self.inflight
            .remove_if(key, |_, registered| Arc::ptr_eq(registered, &cell));
        result
    }

    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }
}

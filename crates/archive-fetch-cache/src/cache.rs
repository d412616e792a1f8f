use crate::key::CacheValue;
use archive_common::error::{ArchiveError, Result};
use moka::future::Cache;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FetchCacheConfig {
    pub max_capacity: u64,
    pub ttl: Duration,
}

impl Default for FetchCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Duration::from_secs(6 * 3600),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub in_flight: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// C4: LRU-bounded, TTL-on-read cache with at-most-one in-flight build per
/// fingerprint (spec §4.4). Backed by `moka`, whose `try_get_with` provides
/// the singleflight coalescing guarantee directly: concurrent callers for
/// the same key await one builder invocation and share its result.
pub struct FetchCache {
    inner: Cache<String, CacheValue>,
    hits: AtomicU64,
    misses: AtomicU64,
    in_flight: Arc<AtomicU64>,
}

impl FetchCache {
    pub fn new(config: FetchCacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl)
            .build();
        Self {
            inner,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the cached value and `true` when already present, otherwise
    /// runs `builder` (coalesced with any concurrent caller for the same
    /// key) and returns its result with `false`. Builder failures are never
    /// cached: the next caller retries from scratch (spec §4.4).
    #[tracing::instrument(skip_all, fields(key = %key))]
    pub async fn get_or_build<F, Fut>(&self, key: &str, builder: F) -> Result<(CacheValue, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheValue>>,
    {
        if let Some(value) = self.inner.get(key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((value, true));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::Relaxed);

        let result = self
            .inner
            .try_get_with(key.to_string(), async move {
                let outcome = builder().await;
                outcome.map_err(Arc::new)
            })
            .await;

        in_flight.fetch_sub(1, Ordering::Relaxed);

        match result {
            Ok(value) => Ok((value, false)),
            Err(err) => Err(Arc::try_unwrap(err).unwrap_or_else(|shared| (*shared).clone())),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
        }
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

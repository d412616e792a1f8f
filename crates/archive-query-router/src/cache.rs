use archive_query_classifier::Target;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CachedResult {
    pub rows: Vec<Value>,
    pub degraded: bool,
}

/// Two-level result cache keyed by `(sql_canonical, target, context_key)`
/// (spec §4.9). L1 is a small, short-TTL in-process tier; L2 is a larger,
/// longer-TTL tier meant to be shared across workers in a real deployment
/// (here, still in-process — see DESIGN.md).
///
/// Write invalidation: every write that resolves to table `T` evicts every
/// cached entry whose dependency set contains `T`, tracked via a reverse
/// table→keys index.
pub struct ResultCache {
    l1: moka::future::Cache<String, Arc<CachedResult>>,
    l2: moka::future::Cache<String, Arc<CachedResult>>,
    table_index: DashMap<String, HashSet<String>>,
}

impl ResultCache {
    pub fn new(l1_ttl: Duration, l2_ttl: Duration) -> Self {
        Self {
            l1: moka::future::Cache::builder().max_capacity(2_000).time_to_live(l1_ttl).build(),
            l2: moka::future::Cache::builder().max_capacity(50_000).time_to_live(l2_ttl).build(),
            table_index: DashMap::new(),
        }
    }

    pub fn make_key(sql_canonical: &str, target: Target, context_key: &str) -> String {
        format!("{sql_canonical}\u{1}{target:?}\u{1}{context_key}")
    }

    pub async fn get(&self, key: &str) -> Option<Arc<CachedResult>> {
        if let Some(value) = self.l1.get(key).await {
            return Some(value);
        }
        self.l2.get(key).await
    }

    pub async fn put(&self, key: String, value: CachedResult, tables: &[String]) {
        let value = Arc::new(value);
        self.l1.insert(key.clone(), value.clone()).await;
        self.l2.insert(key.clone(), value).await;
        for table in tables {
            self.table_index.entry(table.clone()).or_default().insert(key.clone());
        }
    }

    /// Evict every cached entry whose dependency set contains `table`.
    pub async fn invalidate_table(&self, table: &str) {
        if let Some((_, keys)) = self.table_index.remove(table) {
            debug!(table, evicted = keys.len(), "invalidating cache entries for write");
            for key in keys {
                self.l1.invalidate(&key).await;
                self.l2.invalidate(&key).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = ResultCache::new(Duration::from_secs(30), Duration::from_secs(300));
        let key = ResultCache::make_key("select 1", Target::Oltp, "ctx");
        cache
            .put(key.clone(), CachedResult { rows: vec![], degraded: false }, &["captures".to_string()])
            .await;
        assert!(cache.get(&key).await.is_some());
    }

    #[tokio::test]
    async fn write_to_dependent_table_evicts_entry() {
        let cache = ResultCache::new(Duration::from_secs(30), Duration::from_secs(300));
        let key = ResultCache::make_key("select * from captures", Target::Olap, "ctx");
        cache
            .put(key.clone(), CachedResult { rows: vec![], degraded: false }, &["captures".to_string()])
            .await;
        cache.invalidate_table("captures").await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn write_to_unrelated_table_does_not_evict() {
        let cache = ResultCache::new(Duration::from_secs(30), Duration::from_secs(300));
        let key = ResultCache::make_key("select * from captures", Target::Olap, "ctx");
        cache
            .put(key.clone(), CachedResult { rows: vec![], degraded: false }, &["captures".to_string()])
            .await;
        cache.invalidate_table("domains").await;
        assert!(cache.get(&key).await.is_some());
    }
}

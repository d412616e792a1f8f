use archive_common::error::Result;
use archive_storage::{OlapEngine, OltpPool};
use async_trait::async_trait;
use serde_json::Value;

/// Seam between the router and a concrete OLTP engine, so routing logic
/// (admission, caching, degradation) is testable against an in-memory fake
/// without a live PostgreSQL connection — mirrors the `QueryStrategy`
/// abstraction already used for archive providers.
#[async_trait]
pub trait OltpExecutor: Send + Sync {
    async fn query_rows(&self, sql: &str) -> Result<Vec<Value>>;
    async fn execute(&self, sql: &str) -> Result<u64>;
}

#[async_trait]
pub trait OlapExecutor: Send + Sync {
    async fn query_rows(&self, sql: &str) -> Result<Vec<Value>>;
}

#[async_trait]
impl OltpExecutor for OltpPool {
    async fn query_rows(&self, sql: &str) -> Result<Vec<Value>> {
        OltpPool::query_rows(self, sql).await
    }
    async fn execute(&self, sql: &str) -> Result<u64> {
        OltpPool::execute(self, sql).await
    }
}

#[async_trait]
impl OlapExecutor for OlapEngine {
    async fn query_rows(&self, sql: &str) -> Result<Vec<Value>> {
        OlapEngine::query_rows(self, sql).await
    }
}

use archive_breaker::CircuitState;
use archive_capture::Capture;
use archive_common::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub resume_key: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct StrategyResult {
    pub captures: Vec<Capture>,
    pub resume_key: Option<String>,
    pub latency_ms: u64,
}

#[derive(Debug, Clone)]
pub struct StrategyHealth {
    pub healthy: bool,
    pub breaker_state: CircuitState,
    pub avg_latency_ms: f64,
}

/// Uniform contract every archive access path implements (spec §4.5).
/// A strategy must never retry silently more than once inside a single
/// call — retries belong to the router.
#[async_trait]
pub trait QueryStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn query(
        &self,
        domain: &str,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
        opts: &QueryOptions,
    ) -> Result<StrategyResult>;

    async fn health(&self) -> StrategyHealth;

    /// Shortest budget worth spending on this strategy — below this, the
    /// router should skip straight to the next one rather than attempt a
    /// call that can't realistically complete (spec §5). Defaults to a
    /// conservative floor; strategies with a heavier round trip (an extra
    /// proxy hop, a large index file fetch) override it.
    fn min_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(500)
    }
}

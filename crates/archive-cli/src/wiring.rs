//! Builds the long-lived routers/engines shared by every subcommand from a
//! loaded `SystemConfig`, following the teacher's pattern of assembling
//! dependencies once in `main` rather than inside each command.

use archive_breaker::{CircuitBreaker, CircuitBreakerConfig};
use archive_common::{Preference, SystemConfig};
use archive_extractor::{ExtractorCascade, ExtractorCascadeConfig};
use archive_filters::FilterConfig;
use archive_providers::{
    DirectIndexStrategy, PrimaryCdxStrategy, PrimaryColumnarStrategy, ProxiedColumnarStrategy,
    ProxyPool, ProxyRotationPolicy as ProviderRotationPolicy, QueryStrategy, SecondaryArchiveStrategy,
};
use archive_query_classifier::ClassifierContext;
use archive_query_router::{AdmissionController, HybridQueryRouter, PoolGroup, ResultCache};
use archive_router::{ArchiveRouter, FallbackPolicy};
use archive_storage::{OlapEngine, OltpPool};
use std::sync::Arc;
use std::time::Duration;

const PRIMARY_CDX_ENDPOINT: &str = "https://web.archive.org/cdx/search/cdx";
const PRIMARY_COLUMNAR_ENDPOINT: &str = "https://index.commoncrawl.org/CC-MAIN-latest-index";
const DIRECT_INDEX_URL_TEMPLATE: &str = "https://data.commoncrawl.org/cc-index/{domain}.ndjson";
const SECONDARY_ENDPOINT: &str = "https://archive.org.uk/cdx/search/cdx";

fn strategy_timeout(config: &SystemConfig, strategy_name: &str, default_ms: u64) -> Duration {
    let ms = config
        .archive
        .strategy_timeouts_ms
        .get(strategy_name)
        .copied()
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

pub fn build_archive_router(config: &SystemConfig) -> ArchiveRouter {
    let proxy_pool = Arc::new(ProxyPool::new(
        config.proxy.endpoints.clone(),
        match config.proxy.rotation_policy {
            archive_common::config::ProxyRotationPolicy::Random => ProviderRotationPolicy::UniformRandom,
            archive_common::config::ProxyRotationPolicy::RoundRobin => ProviderRotationPolicy::RoundRobin,
        },
    ));

    let strategies: Vec<Arc<dyn QueryStrategy>> = vec![
        Arc::new(PrimaryCdxStrategy::with_timeout(
            PRIMARY_CDX_ENDPOINT,
            config.archive.primary_cdx_requests_per_minute,
            strategy_timeout(config, "primary_cdx", 10_000),
        )),
        Arc::new(PrimaryColumnarStrategy::with_timeout(
            PRIMARY_COLUMNAR_ENDPOINT,
            strategy_timeout(config, "primary_columnar", 10_000),
        )),
        Arc::new(ProxiedColumnarStrategy::with_timeout(
            PRIMARY_COLUMNAR_ENDPOINT,
            proxy_pool,
            strategy_timeout(config, "proxied_columnar", 15_000),
        )),
        Arc::new(DirectIndexStrategy::with_timeout(
            DIRECT_INDEX_URL_TEMPLATE,
            strategy_timeout(config, "direct_index", 20_000),
        )),
        Arc::new(SecondaryArchiveStrategy::with_timeout(
            SECONDARY_ENDPOINT,
            strategy_timeout(config, "secondary_archive", 10_000),
        )),
    ];

    ArchiveRouter::with_fallback_policy(
        strategies,
        FilterConfig::default(),
        FallbackPolicy {
            enabled: config.archive.fallback_enabled,
            delay: Duration::from_secs(config.archive.fallback_delay_seconds),
            max_attempts: config.archive.max_fallback_attempts,
        },
    )
}

pub fn build_extractor_cascade(config: &SystemConfig) -> ExtractorCascade {
    ExtractorCascade::new(ExtractorCascadeConfig {
        min_text_length: config.extractor.min_text_length,
        reach_through_requests_per_minute: config.extractor.archive_reachthrough_requests_per_minute,
        tier_breaker_thresholds: config.extractor.tier_breaker_thresholds.clone(),
        tier_backoff_timeouts_s: config.extractor.tier_backoff_timeouts_s.clone(),
    })
}

pub fn default_preference(config: &SystemConfig) -> Preference {
    config.archive.preference
}

/// Connects to the configured OLTP/OLAP backends and assembles the hybrid
/// router. Each pool here is a single replica; a multi-replica deployment
/// would push more `Arc`s into the same `PoolGroup`.
pub async fn build_query_router(config: &SystemConfig) -> anyhow::Result<HybridQueryRouter> {
    let oltp = OltpPool::connect(&config.storage.postgres_url, &config.router.pools.oltp).await?;
    let olap = OlapEngine::open(&config.storage.duckdb_path)?;

    let oltp_executor: Box<dyn archive_query_router::OltpExecutor> = Box::new(oltp);
    let olap_executor: Box<dyn archive_query_router::OlapExecutor> = Box::new(olap);

    let breaker_config = CircuitBreakerConfig {
        failure_threshold: config.breaker.failure_threshold,
        recovery_timeout: Duration::from_secs(config.breaker.recovery_timeout_s),
        max_recovery_timeout: Duration::from_secs(config.breaker.max_recovery_timeout_s),
        half_open_max_probes: config.breaker.half_open_max_probes,
    };

    Ok(HybridQueryRouter::new(
        ClassifierContext {
            olap_row_threshold: config.router.olap_analytics_row_threshold,
            ..ClassifierContext::default()
        },
        AdmissionController::new(config.router.quotas.critical, config.router.quotas.high, config.router.quotas.normal),
        ResultCache::new(
            Duration::from_secs(config.router.cache_l1_ttl_s),
            Duration::from_secs(config.router.cache_l2_ttl_s),
        ),
        PoolGroup::new(vec![Arc::new(oltp_executor)]),
        PoolGroup::new(vec![Arc::new(olap_executor)]),
        CircuitBreaker::new("oltp_pool", breaker_config.clone()),
        CircuitBreaker::new("olap_pool", breaker_config),
    ))
}

//! System-wide configuration surface (spec §6), loaded from a single TOML
//! file, following `crates/common/src/config.rs::SystemConfig::load` in the
//! teacher crate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub archive: ArchiveConfig,
    pub breaker: BreakerConfig,
    pub proxy: ProxyConfig,
    pub fetch_cache: FetchCacheConfig,
    pub extractor: ExtractorConfig,
    pub router: RouterConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            archive: ArchiveConfig::default(),
            breaker: BreakerConfig::default(),
            proxy: ProxyConfig::default(),
            fetch_cache: FetchCacheConfig::default(),
            extractor: ExtractorConfig::default(),
            router: RouterConfig::default(),
            sync: SyncConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl SystemConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SystemConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub preference: crate::Preference,
    pub fallback_enabled: bool,
    pub fallback_delay_seconds: u64,
    pub max_fallback_attempts: usize,
    /// Per-strategy timeout budget, keyed by strategy name.
    pub strategy_timeouts_ms: HashMap<String, u64>,
    pub primary_cdx_requests_per_minute: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        let mut strategy_timeouts_ms = HashMap::new();
        strategy_timeouts_ms.insert("primary_cdx".to_string(), 10_000);
        strategy_timeouts_ms.insert("primary_columnar".to_string(), 10_000);
        strategy_timeouts_ms.insert("proxied_columnar".to_string(), 15_000);
        strategy_timeouts_ms.insert("direct_index".to_string(), 20_000);
        strategy_timeouts_ms.insert("secondary_archive".to_string(), 10_000);

        Self {
            preference: crate::Preference::Hybrid,
            fallback_enabled: true,
            fallback_delay_seconds: 0,
            max_fallback_attempts: 5,
            strategy_timeouts_ms,
            primary_cdx_requests_per_minute: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout_s: u64,
    pub half_open_max_probes: u32,
    pub max_recovery_timeout_s: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_s: 30,
            half_open_max_probes: 3,
            max_recovery_timeout_s: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProxyRotationPolicy {
    Random,
    RoundRobin,
}

impl Default for ProxyRotationPolicy {
    fn default() -> Self {
        Self::Random
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub endpoints: Vec<String>,
    pub credentials: Option<String>,
    pub rotation_policy: ProxyRotationPolicy,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            credentials: None,
            rotation_policy: ProxyRotationPolicy::Random,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchCacheConfig {
    pub max_entries: u64,
    pub ttl_s: u64,
}

impl Default for FetchCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 50_000,
            ttl_s: 86_400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub min_text_length: usize,
    pub archive_reachthrough_requests_per_minute: u32,
    pub archive_reachthrough_min_interval_s: u64,
    pub tier_breaker_thresholds: HashMap<String, u32>,
    pub tier_backoff_timeouts_s: HashMap<String, u64>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        let mut tier_breaker_thresholds = HashMap::new();
        tier_breaker_thresholds.insert("t1_structure_aware".to_string(), 10);
        tier_breaker_thresholds.insert("t2_news_style".to_string(), 8);
        tier_breaker_thresholds.insert("t3_generic_html".to_string(), 3);
        tier_breaker_thresholds.insert("t4_archive_reach_through".to_string(), 5);

        let mut tier_backoff_timeouts_s = HashMap::new();
        tier_backoff_timeouts_s.insert("t1_structure_aware".to_string(), 30);
        tier_backoff_timeouts_s.insert("t2_news_style".to_string(), 45);
        tier_backoff_timeouts_s.insert("t3_generic_html".to_string(), 20);
        tier_backoff_timeouts_s.insert("t4_archive_reach_through".to_string(), 60);

        Self {
            min_text_length: 200,
            archive_reachthrough_requests_per_minute: 15,
            archive_reachthrough_min_interval_s: 4,
            tier_breaker_thresholds,
            tier_backoff_timeouts_s,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_conn: u32,
    pub idle_timeout_s: u64,
    pub max_lifetime_s: u64,
    pub health_check_interval_s: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_conn: 10,
            idle_timeout_s: 600,
            max_lifetime_s: 1800,
            health_check_interval_s: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub critical: usize,
    pub high: usize,
    pub normal: usize,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            critical: 10,
            high: 30,
            normal: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub pools: PoolsConfig,
    pub quotas: QuotaConfig,
    pub cache_l1_ttl_s: u64,
    pub cache_l2_ttl_s: u64,
    pub olap_analytics_row_threshold: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            pools: PoolsConfig::default(),
            quotas: QuotaConfig::default(),
            cache_l1_ttl_s: 30,
            cache_l2_ttl_s: 300,
            olap_analytics_row_threshold: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolsConfig {
    pub oltp: PoolConfig,
    pub olap: PoolConfig,
}

impl Default for PoolsConfig {
    fn default() -> Self {
        Self {
            oltp: PoolConfig::default(),
            olap: PoolConfig {
                max_conn: 4,
                ..PoolConfig::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub batch_size: usize,
    pub watermark_high: usize,
    pub watermark_low: usize,
    pub retention_days: u32,
    pub staleness_budget_s: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            watermark_high: 10_000,
            watermark_low: 2_000,
            retention_days: 30,
            staleness_budget_s: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub postgres_url: String,
    pub duckdb_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            postgres_url: "postgres://localhost/archive".to_string(),
            duckdb_path: "archive_olap.duckdb".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = SystemConfig::default();
        let serialized = toml::to_string(&config).expect("serialize");
        let deserialized: SystemConfig = toml::from_str(&serialized).expect("deserialize");
        assert_eq!(deserialized.breaker.failure_threshold, config.breaker.failure_threshold);
        assert_eq!(deserialized.extractor.min_text_length, config.extractor.min_text_length);
    }

    #[test]
    fn partial_toml_fills_remaining_fields_with_defaults() {
        let partial = "[breaker]\nfailure_threshold = 7\n";
        let config: SystemConfig = toml::from_str(partial).expect("deserialize partial");
        assert_eq!(config.breaker.failure_threshold, 7);
        assert_eq!(config.fetch_cache.max_entries, FetchCacheConfig::default().max_entries);
    }
}

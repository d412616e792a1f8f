use crate::proxy::ProxyPool;
use crate::strategies::primary_columnar::PrimaryColumnarStrategy;
use crate::strategy::{QueryOptions, QueryStrategy, StrategyHealth, StrategyResult};
use archive_breaker::{CircuitBreaker, CircuitBreakerConfig};
use archive_common::error::{ArchiveError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Same as the primary columnar strategy but routed through a rotating
/// authenticated proxy pool (spec §4.5.3). Used when the direct API path
/// is throttled or blocked for the caller's egress IPs.
pub struct ProxiedColumnarStrategy {
    index_endpoint: String,
    proxy_pool: Arc<ProxyPool>,
    breaker: CircuitBreaker,
    timeout: Duration,
}

impl ProxiedColumnarStrategy {
    pub fn new(index_endpoint: impl Into<String>, proxy_pool: Arc<ProxyPool>) -> Self {
        Self::with_timeout(index_endpoint, proxy_pool, Duration::from_secs(15))
    }

    pub fn with_timeout(index_endpoint: impl Into<String>, proxy_pool: Arc<ProxyPool>, timeout: Duration) -> Self {
        Self {
            index_endpoint: index_endpoint.into(),
            proxy_pool,
            breaker: CircuitBreaker::new("proxied_columnar", CircuitBreakerConfig::default()),
            timeout,
        }
    }
}

#[async_trait]
impl QueryStrategy for ProxiedColumnarStrategy {
    fn name(&self) -> &str {
        "proxied_columnar"
    }

    #[instrument(skip(self, opts), fields(strategy = "proxied_columnar", domain = %domain))]
    async fn query(
        &self,
        domain: &str,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
        opts: &QueryOptions,
    ) -> Result<StrategyResult> {
        let Some(proxy) = self.proxy_pool.pick() else {
            return Err(ArchiveError::UpstreamUnavailable(
                "no proxy available, all endpoints cooling down".into(),
            ));
        };

        let client = reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(&proxy).map_err(|e| ArchiveError::Config(e.to_string()))?)
            .timeout(self.timeout)
            .build()
            .map_err(|e| ArchiveError::Config(e.to_string()))?;

        let endpoint = self.index_endpoint.clone();
        let domain = domain.to_string();
        let page = opts
            .resume_key
            .as_ref()
            .and_then(|k| k.parse::<u32>().ok())
            .unwrap_or(0);
        let page_size = opts.limit.unwrap_or(1000);

        let started = Instant::now();
        let proxy_pool = Arc::clone(&self.proxy_pool);
        let body = self
            .breaker
            .call(|| async move {
                let outcome = client
                    .get(&endpoint)
                    .query(&[
                        ("url", domain.as_str()),
                        ("from", &from_date.format("%Y%m%d").to_string()),
                        ("to", &to_date.format("%Y%m%d").to_string()),
                        ("page", &page.to_string()),
                        ("pageSize", &page_size.to_string()),
                        ("output", "json"),
                    ])
                    .send()
                    .await;

                match outcome {
                    Ok(response) if response.status().is_success() => {
                        proxy_pool.record_success(&proxy);
                        response
                            .text()
                            .await
                            .map_err(|e| ArchiveError::Transient(e.to_string()))
                    }
                    Ok(response) if response.status().as_u16() == 404 => {
                        proxy_pool.record_success(&proxy);
                        Err(ArchiveError::ClientError("no archives for domain".into()))
                    }
                    Ok(response) => {
                        proxy_pool.record_failure(&proxy);
                        Err(ArchiveError::Transient(format!(
                            "proxied columnar index returned {}",
                            response.status()
                        )))
                    }
                    Err(e) => {
                        proxy_pool.record_failure(&proxy);
                        Err(ArchiveError::Transient(e.to_string()))
                    }
                }
            })
            .await?;

        let captures = PrimaryColumnarStrategy::parse_ndjson(&body);
        let resume_key = if captures.len() as u32 >= page_size {
            Some((page + 1).to_string())
        } else {
            None
        };

        Ok(StrategyResult {
            captures,
            resume_key,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn health(&self) -> StrategyHealth {
        let state = self.breaker.state().await;
        StrategyHealth {
            healthy: matches!(state, archive_breaker::CircuitState::Closed) && !self.proxy_pool.is_empty(),
            breaker_state: state,
            avg_latency_ms: 0.0,
        }
    }

    fn min_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(800)
    }
}

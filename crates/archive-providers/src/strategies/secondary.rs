use crate::strategy::{QueryOptions, QueryStrategy, StrategyHealth, StrategyResult};
use archive_breaker::{CircuitBreaker, CircuitBreakerConfig};
use archive_capture::Capture;
use archive_common::error::{ArchiveError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::instrument;

/// A completely separate archive of last resort, reached only when every
/// primary/proxied/direct path has failed (spec §4.5.5). Speaks the same
/// CDX wire shape as the primary Wayback-style endpoint.
pub struct SecondaryArchiveStrategy {
    client: reqwest::Client,
    endpoint: String,
    breaker: CircuitBreaker,
}

impl SecondaryArchiveStrategy {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, Duration::from_secs(10))
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client config is valid"),
            endpoint: endpoint.into(),
            breaker: CircuitBreaker::new("secondary_archive", CircuitBreakerConfig::default()),
        }
    }
}

#[async_trait]
impl QueryStrategy for SecondaryArchiveStrategy {
    fn name(&self) -> &str {
        "secondary_archive"
    }

    #[instrument(skip(self, _opts), fields(strategy = "secondary_archive", domain = %domain))]
    async fn query(
        &self,
        domain: &str,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
        _opts: &QueryOptions,
    ) -> Result<StrategyResult> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let domain = domain.to_string();
        let from_date = from_date.format("%Y%m%d").to_string();
        let to_date = to_date.format("%Y%m%d").to_string();

        let started = Instant::now();
        let body = self
            .breaker
            .call(|| async move {
                let response = client
                    .get(&endpoint)
                    .query(&[
                        ("url", domain.as_str()),
                        ("from", from_date.as_str()),
                        ("to", to_date.as_str()),
                        ("output", "text"),
                    ])
                    .send()
                    .await
                    .map_err(|e| {
                        if e.is_timeout() || e.is_connect() {
                            ArchiveError::Transient(e.to_string())
                        } else {
                            ArchiveError::UpstreamUnavailable(e.to_string())
                        }
                    })?;

                if response.status().as_u16() == 404 {
                    return Err(ArchiveError::ClientError("no archives for domain".into()));
                }
                if !response.status().is_success() {
                    return Err(ArchiveError::Transient(format!(
                        "secondary archive returned {}",
                        response.status()
                    )));
                }

                response
                    .text()
                    .await
                    .map_err(|e| ArchiveError::Transient(e.to_string()))
            })
            .await?;

        let captures: Vec<Capture> = body
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(Capture::from_secondary)
            .collect();

        Ok(StrategyResult {
            captures,
            resume_key: None,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn health(&self) -> StrategyHealth {
        let state = self.breaker.state().await;
        StrategyHealth {
            healthy: matches!(state, archive_breaker::CircuitState::Closed),
            breaker_state: state,
            avg_latency_ms: 0.0,
        }
    }
}

use crate::strategies::primary_columnar::PrimaryColumnarStrategy;
use crate::strategy::{QueryOptions, QueryStrategy, StrategyHealth, StrategyResult};
use archive_breaker::{CircuitBreaker, CircuitBreakerConfig};
use archive_capture::Capture;
use archive_common::error::{ArchiveError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::instrument;

/// Bypasses the provider's query API by fetching and scanning the
/// published monthly index files directly — line-delimited JSON over
/// range-readable storage (spec §4.5.4). Used when the API is blocked or
/// throttled. The index file layout is reached through a caller-supplied
/// URL template rather than a hard-coded publisher path scheme, per the
/// Open Question resolution in the expanded spec.
pub struct DirectIndexStrategy {
    client: reqwest::Client,
    index_file_url_template: String,
    breaker: CircuitBreaker,
}

impl DirectIndexStrategy {
    /// `index_file_url_template` must contain a `{domain}` placeholder,
    /// e.g. `https://index.example.org/cc-main/{domain}.ndjson`.
    pub fn new(index_file_url_template: impl Into<String>) -> Self {
        Self::with_timeout(index_file_url_template, Duration::from_secs(20))
    }

    pub fn with_timeout(index_file_url_template: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client config is valid"),
            index_file_url_template: index_file_url_template.into(),
            breaker: CircuitBreaker::new("direct_index", CircuitBreakerConfig::default()),
        }
    }

    fn resolve_url(&self, domain: &str) -> String {
        self.index_file_url_template
            .replace("{domain}", &urlencoding::encode(domain))
    }

    fn filter_by_window(
        captures: Vec<Capture>,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
    ) -> Vec<Capture> {
        captures
            .into_iter()
            .filter(|c| c.timestamp >= from_date && c.timestamp <= to_date)
            .collect()
    }
}

#[async_trait]
impl QueryStrategy for DirectIndexStrategy {
    fn name(&self) -> &str {
        "direct_index"
    }

    #[instrument(skip(self, _opts), fields(strategy = "direct_index", domain = %domain))]
    async fn query(
        &self,
        domain: &str,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
        _opts: &QueryOptions,
    ) -> Result<StrategyResult> {
        let url = self.resolve_url(domain);
        let client = self.client.clone();

        let started = Instant::now();
        let body = self
            .breaker
            .call(|| async move {
                let response = client.get(&url).send().await.map_err(|e| {
                    if e.is_timeout() || e.is_connect() {
                        ArchiveError::Transient(e.to_string())
                    } else {
                        ArchiveError::UpstreamUnavailable(e.to_string())
                    }
                })?;

                if response.status().as_u16() == 404 {
                    return Err(ArchiveError::ClientError("no index file for domain".into()));
                }
                if !response.status().is_success() {
                    return Err(ArchiveError::Transient(format!(
                        "index file fetch returned {}",
                        response.status()
                    )));
                }

                response
                    .text()
                    .await
                    .map_err(|e| ArchiveError::Transient(e.to_string()))
            })
            .await?;

        let captures = PrimaryColumnarStrategy::parse_ndjson(&body);
        let captures = Self::filter_by_window(captures, from_date, to_date);

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

    fn min_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_url_template_with_domain_placeholder() {
        let strategy = DirectIndexStrategy::new("https://index.example.org/{domain}.ndjson");
        assert_eq!(
            strategy.resolve_url("example.com"),
            "https://index.example.org/example.com.ndjson"
        );
    }

    #[test]
    fn filters_captures_outside_the_requested_window() {
        let captures = vec![
            Capture::from_wayback("20230101000000 https://example.com/a text/html 200 - -"),
            Capture::from_wayback("20240601000000 https://example.com/b text/html 200 - -"),
        ];
        let from = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let to = DateTime::parse_from_rfc3339("2024-12-31T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let filtered = DirectIndexStrategy::filter_by_window(captures, from, to);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].original_url, "https://example.com/b");
    }
}

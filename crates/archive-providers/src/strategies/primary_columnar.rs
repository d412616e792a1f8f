use crate::strategy::{QueryOptions, QueryStrategy, StrategyHealth, StrategyResult};
use archive_breaker::{CircuitBreaker, CircuitBreakerConfig};
use archive_capture::{Capture, CommonCrawlRow};
use archive_common::error::{ArchiveError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::instrument;

/// Common-Crawl-style columnar index API, returning locator-bearing
/// records (spec §4.5.2).
pub struct PrimaryColumnarStrategy {
    client: reqwest::Client,
    index_endpoint: String,
    breaker: CircuitBreaker,
}

impl PrimaryColumnarStrategy {
    pub fn new(index_endpoint: impl Into<String>) -> Self {
        Self::with_timeout(index_endpoint, Duration::from_secs(10))
    }

    pub fn with_timeout(index_endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client config is valid"),
            index_endpoint: index_endpoint.into(),
            breaker: CircuitBreaker::new("primary_columnar", CircuitBreakerConfig::default()),
        }
    }

    pub(crate) fn parse_ndjson(body: &str) -> Vec<Capture> {
        body.lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str::<CommonCrawlRow>(line).ok())
            .map(|row| Capture::from_common_crawl(&row))
            .collect()
    }
}

#[async_trait]
impl QueryStrategy for PrimaryColumnarStrategy {
    fn name(&self) -> &str {
        "primary_columnar"
    }

    #[instrument(skip(self, opts), fields(strategy = "primary_columnar", domain = %domain))]
    async fn query(
        &self,
        domain: &str,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
        opts: &QueryOptions,
    ) -> Result<StrategyResult> {
        let client = self.client.clone();
        let endpoint = self.index_endpoint.clone();
        let domain = domain.to_string();
        let page = opts
            .resume_key
            .as_ref()
            .and_then(|k| k.parse::<u32>().ok())
            .unwrap_or(0);
        let page_size = opts.limit.unwrap_or(1000);

        let started = Instant::now();
        let body = self
            .breaker
            .call(|| async move {
                let response = client
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
                        "columnar index returned {}",
                        response.status()
                    )));
                }

                response
                    .text()
                    .await
                    .map_err(|e| ArchiveError::Transient(e.to_string()))
            })
            .await?;

        let captures = Self::parse_ndjson(&body);
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
            healthy: matches!(state, archive_breaker::CircuitState::Closed),
            breaker_state: state,
            avg_latency_ms: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ndjson_rows_into_captures() {
        let body = r#"{"timestamp":"2024-01-15T00:00:00Z","url":"https://example.com/a","filename":"x.warc.gz","offset":10,"length":20,"status":200,"mime":"text/html","digest":"ABC"}
{"timestamp":"2024-01-16T00:00:00Z","url":"https://example.com/b","filename":null,"offset":null,"length":null,"status":200,"mime":"text/html","digest":null}"#;
        let captures = PrimaryColumnarStrategy::parse_ndjson(body);
        assert_eq!(captures.len(), 2);
        assert!(captures[0].locator.is_some());
        assert!(captures[1].locator.is_none());
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let body = "not json\n{\"timestamp\":\"2024-01-15T00:00:00Z\",\"url\":\"https://example.com/a\"}";
        let captures = PrimaryColumnarStrategy::parse_ndjson(body);
        assert_eq!(captures.len(), 1);
    }
}

use crate::dead_letter::{DeadLetterEvent, DeadLetterSink, LoggingDeadLetterSink};
use crate::tiers;
use archive_breaker::{CircuitBreaker, CircuitBreakerConfig};
use archive_common::error::{ArchiveError, Result};
use archive_common::rate_limit::LeakyBucketLimiter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct ExtractorCascadeConfig {
    pub min_text_length: usize,
    /// Requests/minute for the T4 archive reach-through re-fetch, shared
    /// across all reach-through attempts (spec §4.7's Archive.org-style
    /// limiter).
    pub reach_through_requests_per_minute: u32,
    /// Per-tier consecutive-failure threshold, keyed by tier name (e.g.
    /// `t1_structure_aware`). Tiers missing from the map fall back to the
    /// hard-coded defaults in `default_tier_thresholds`.
    pub tier_breaker_thresholds: HashMap<String, u32>,
    /// Per-tier breaker recovery timeout in seconds, keyed the same way.
    pub tier_backoff_timeouts_s: HashMap<String, u64>,
}

impl Default for ExtractorCascadeConfig {
    fn default() -> Self {
        Self {
            min_text_length: 200,
            reach_through_requests_per_minute: 15,
            tier_breaker_thresholds: HashMap::new(),
            tier_backoff_timeouts_s: HashMap::new(),
        }
    }
}

fn resolve_threshold(config: &ExtractorCascadeConfig, name: &str, default: u32) -> u32 {
    config.tier_breaker_thresholds.get(name).copied().unwrap_or(default)
}

fn resolve_timeout(config: &ExtractorCascadeConfig, name: &str, default_s: u64) -> Duration {
    Duration::from_secs(config.tier_backoff_timeouts_s.get(name).copied().unwrap_or(default_s))
}

#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub text: String,
    pub tier_used: &'static str,
}

struct Tier {
    name: &'static str,
    breaker: CircuitBreaker,
}

fn tier_breaker(name: &'static str, threshold: u32, timeout: Duration) -> Tier {
    Tier {
        name,
        breaker: CircuitBreaker::new(
            name,
            CircuitBreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: timeout,
                max_recovery_timeout: timeout * 8,
                half_open_max_probes: 1,
            },
        ),
    }
}

/// Four-tier content extraction cascade (spec §4.7). Tiers are tried in
/// order; a tier is skipped if its breaker is open. The first tier whose
/// output exceeds `min_text_length` wins. If every tier fails, the event
/// is handed to a `DeadLetterSink` instead of raising.
pub struct ExtractorCascade {
    config: ExtractorCascadeConfig,
    t1_structure_aware: Tier,
    t2_news_style: Tier,
    t3_generic_html: Tier,
    t4_archive_reach_through: Tier,
    reach_through_limiter: Arc<LeakyBucketLimiter>,
    http_client: reqwest::Client,
    dead_letter: Arc<dyn DeadLetterSink>,
}

impl ExtractorCascade {
    pub fn new(config: ExtractorCascadeConfig) -> Self {
        Self::with_dead_letter_sink(config, Arc::new(LoggingDeadLetterSink))
    }

    pub fn with_dead_letter_sink(
        config: ExtractorCascadeConfig,
        dead_letter: Arc<dyn DeadLetterSink>,
    ) -> Self {
        Self {
            reach_through_limiter: Arc::new(LeakyBucketLimiter::new(
                config.reach_through_requests_per_minute,
                Duration::from_millis(0),
            )),
            t1_structure_aware: tier_breaker(
                "t1_structure_aware",
                resolve_threshold(&config, "t1_structure_aware", 10),
                resolve_timeout(&config, "t1_structure_aware", 30),
            ),
            t2_news_style: tier_breaker(
                "t2_news_style",
                resolve_threshold(&config, "t2_news_style", 8),
                resolve_timeout(&config, "t2_news_style", 45),
            ),
            t3_generic_html: tier_breaker(
                "t3_generic_html",
                resolve_threshold(&config, "t3_generic_html", 3),
                resolve_timeout(&config, "t3_generic_html", 20),
            ),
            t4_archive_reach_through: tier_breaker(
                "t4_archive_reach_through",
                resolve_threshold(&config, "t4_archive_reach_through", 5),
                resolve_timeout(&config, "t4_archive_reach_through", 60),
            ),
            http_client: reqwest::Client::new(),
            config,
            dead_letter,
        }
    }

    /// Extract text from `html` fetched from `url`. `reach_through_url` is
    /// the archive's canonical reach-through form (e.g. the Wayback
    /// `archive_url`), used only by T4 when the earlier tiers fail.
    #[instrument(skip(self, html), fields(url = %url))]
    pub async fn extract(
        &self,
        html: &str,
        url: &str,
        reach_through_url: Option<&str>,
    ) -> Result<ExtractionOutcome> {
        let mut tiers_attempted = Vec::new();

        if let Some(outcome) = self.try_tier_sync(&self.t1_structure_aware, &mut tiers_attempted, || {
            tiers::extract_structure_aware(html, url)
        })
        .await?
        {
            return Ok(outcome);
        }

        if let Some(outcome) = self
            .try_tier_sync(&self.t2_news_style, &mut tiers_attempted, || {
                tiers::extract_news_style(html)
            })
            .await?
        {
            return Ok(outcome);
        }

        if let Some(outcome) = self
            .try_tier_sync(&self.t3_generic_html, &mut tiers_attempted, || {
                tiers::extract_generic_html(html)
            })
            .await?
        {
            return Ok(outcome);
        }

        if let Some(reach_through_url) = reach_through_url {
            if let Some(outcome) = self
                .try_reach_through(reach_through_url, url, &mut tiers_attempted)
                .await?
            {
                return Ok(outcome);
            }
        }

        warn!(url = %url, tiers = ?tiers_attempted, "all extraction tiers failed");
        self.dead_letter.emit(DeadLetterEvent {
            url: url.to_string(),
            tiers_attempted,
            occurred_at: chrono::Utc::now(),
        });

        Err(ArchiveError::ExtractionFailed {
            url: url.to_string(),
        })
    }

    async fn try_tier_sync<F>(
        &self,
        tier: &Tier,
        tiers_attempted: &mut Vec<String>,
        extract_fn: F,
    ) -> Result<Option<ExtractionOutcome>>
    where
        F: FnOnce() -> Option<String> + Send,
    {
        if matches!(tier.breaker.state().await, archive_breaker::CircuitState::Open) {
            tiers_attempted.push(format!("{} (skipped: breaker open)", tier.name));
            return Ok(None);
        }

        tiers_attempted.push(tier.name.to_string());
        let min_length = self.config.min_text_length;

        // Below-minimum/no-text extraction is not a tier failure -- the tier
        // ran fine, it just didn't find enough content on this document. Only
        // route genuine extraction errors through the breaker so a run of
        // thin pages can't trip T1/T2 and take them out of rotation.
        let extracted = extract_fn();
        let text = match extracted {
            Some(text) if text.len() >= min_length => text,
            _ => return Ok(None),
        };

        let result = tier.breaker.call(|| async move { Ok::<_, ArchiveError>(text) }).await;

        match result {
            Ok(text) => Ok(Some(ExtractionOutcome {
                text,
                tier_used: tier.name,
            })),
            Err(ArchiveError::CircuitOpen { .. }) | Err(ArchiveError::Transient(_)) => Ok(None),
            Err(other) => Err(other),
        }
    }

    async fn try_reach_through(
        &self,
        reach_through_url: &str,
        original_url: &str,
        tiers_attempted: &mut Vec<String>,
    ) -> Result<Option<ExtractionOutcome>> {
        let tier = &self.t4_archive_reach_through;
        if matches!(tier.breaker.state().await, archive_breaker::CircuitState::Open) {
            tiers_attempted.push(format!("{} (skipped: breaker open)", tier.name));
            return Ok(None);
        }
        tiers_attempted.push(tier.name.to_string());

        self.reach_through_limiter.acquire(None).await?;

        let client = self.http_client.clone();
        let reach_through_url = reach_through_url.to_string();
        let original_url = original_url.to_string();
        let min_length = self.config.min_text_length;

        let result = tier
            .breaker
            .call(|| async move {
                let response = client.get(&reach_through_url).send().await.map_err(|e| {
                    if e.is_timeout() || e.is_connect() {
                        ArchiveError::Transient(e.to_string())
                    } else {
                        ArchiveError::UpstreamUnavailable(e.to_string())
                    }
                })?;
                if !response.status().is_success() {
                    return Err(ArchiveError::Transient(format!(
                        "reach-through fetch returned {}",
                        response.status()
                    )));
                }
                let html = response
                    .text()
                    .await
                    .map_err(|e| ArchiveError::Transient(e.to_string()))?;

                match tiers::extract_generic_html(&html) {
                    Some(text) if text.len() >= min_length => Ok(text),
                    _ => Err(ArchiveError::Transient(
                        "reach-through yielded no usable text".into(),
                    )),
                }
            })
            .await;

        match result {
            Ok(text) => {
                info!(url = %original_url, "recovered via archive reach-through");
                Ok(Some(ExtractionOutcome {
                    text,
                    tier_used: tier.name,
                }))
            }
            Err(ArchiveError::CircuitOpen { .. }) | Err(ArchiveError::Transient(_)) => Ok(None),
            Err(other) => Err(other),
        }
    }
}

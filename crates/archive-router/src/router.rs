use archive_capture::Capture;
use archive_common::error::{ArchiveError, Result, StrategyOutcome};
use archive_common::{Deadline, Preference};
use archive_filters::{apply_filters, FilterConfig};
use archive_providers::{QueryOptions, QueryStrategy};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Aggregated outcome of one `query_unified` call (spec §4.6).
#[derive(Debug, Clone, Default)]
pub struct RouterStats {
    pub successful_strategy: Option<String>,
    pub attempts: usize,
    pub per_strategy_outcomes: Vec<StrategyOutcome>,
}

/// Governs whether and how the router moves to the next strategy after a
/// fallback-triggering failure (spec §6's `archive.fallback_*` knobs).
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    /// When `false`, the router never tries a second strategy: the first
    /// attempt's outcome (success or failure) is final.
    pub enabled: bool,
    /// Delay inserted before each fallback attempt after the first.
    pub delay: Duration,
    /// Hard cap on the number of strategies attempted in one call,
    /// independent of how many are configured or healthy.
    pub max_attempts: usize,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            delay: Duration::from_secs(0),
            max_attempts: 5,
        }
    }
}

/// Fixed ordinal registry: `[primary_cdx, primary_columnar,
/// proxied_columnar, direct_index, secondary]`, matching spec §4.6's
/// `[1, 2, 3, 4, 5]` numbering. The router owns this list exclusively and
/// never tears strategies down once built.
pub struct ArchiveRouter {
    strategies: Vec<Arc<dyn QueryStrategy>>,
    filter_config: FilterConfig,
    fallback: FallbackPolicy,
}

impl ArchiveRouter {
    /// `strategies` must be supplied in canonical order: primary CDX,
    /// primary columnar, proxied columnar, direct index, secondary.
    pub fn new(strategies: Vec<Arc<dyn QueryStrategy>>, filter_config: FilterConfig) -> Self {
        Self::with_fallback_policy(strategies, filter_config, FallbackPolicy::default())
    }

    pub fn with_fallback_policy(
        strategies: Vec<Arc<dyn QueryStrategy>>,
        filter_config: FilterConfig,
        fallback: FallbackPolicy,
    ) -> Self {
        assert_eq!(
            strategies.len(),
            5,
            "router requires exactly the 5 canonical strategies in order"
        );
        Self {
            strategies,
            filter_config,
            fallback,
        }
    }

    fn ordinals_for(preference: Preference) -> &'static [usize] {
        match preference {
            Preference::Wayback => &[0, 4],
            Preference::CommonCrawl => &[1, 2, 3, 0, 4],
            Preference::Hybrid => &[0, 1, 2, 3, 4],
        }
    }

    #[instrument(skip(self), fields(domain = %domain, preference = ?preference))]
    pub async fn query_unified(
        &self,
        domain: &str,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
        preference: Preference,
        deadline: Deadline,
    ) -> Result<(Vec<Capture>, RouterStats)> {
        let mut stats = RouterStats::default();
        let opts = QueryOptions::default();

        for &ordinal in Self::ordinals_for(preference) {
            if deadline.has_expired() {
                warn!("deadline exceeded before exhausting strategy list");
                return Err(ArchiveError::DeadlineExceeded {
                    elapsed_ms: 0,
                });
            }

            if stats.attempts >= self.fallback.max_attempts {
                debug!(max_attempts = self.fallback.max_attempts, "max fallback attempts reached");
                break;
            }

            let strategy = &self.strategies[ordinal];

            if !deadline.has_budget_for(strategy.min_duration()) {
                debug!(strategy = strategy.name(), "skipping strategy, insufficient deadline budget remains");
                continue;
            }

            let health = strategy.health().await;
            if !health.healthy {
                debug!(strategy = strategy.name(), "skipping strategy, breaker not closed");
                continue;
            }

            if stats.attempts > 0 {
                if !self.fallback.enabled {
                    debug!("fallback disabled, not trying another strategy");
                    break;
                }
                if !self.fallback.delay.is_zero() {
                    tokio::time::sleep(self.fallback.delay).await;
                }
            }

            stats.attempts += 1;
            let started = Instant::now();
            let result = strategy.query(domain, from_date, to_date, &opts).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(outcome) => {
                    stats.per_strategy_outcomes.push(StrategyOutcome {
                        strategy: strategy.name().to_string(),
                        succeeded: true,
                        error: None,
                        kind: None,
                        latency_ms,
                    });
                    stats.successful_strategy = Some(strategy.name().to_string());

                    let decisions = apply_filters(&outcome.captures, &self.filter_config);
                    let kept: Vec<Capture> = outcome
                        .captures
                        .into_iter()
                        .zip(decisions)
                        .filter(|(_, decision)| decision.outcome.is_kept())
                        .map(|(capture, _)| capture)
                        .collect();

                    info!(strategy = strategy.name(), kept = kept.len(), "query_unified succeeded");
                    return Ok((kept, stats));
                }
                Err(err) => {
                    let kind = err.kind();
                    stats.per_strategy_outcomes.push(StrategyOutcome {
                        strategy: strategy.name().to_string(),
                        succeeded: false,
                        error: Some(err.to_string()),
                        kind: Some(format!("{kind:?}")),
                        latency_ms,
                    });

                    if !kind.triggers_fallback() {
                        debug!(strategy = strategy.name(), "definitive failure, not falling back");
                        return Err(err);
                    }
                    debug!(strategy = strategy.name(), "transient failure, trying next strategy");
                }
            }
        }

        Err(ArchiveError::AllSourcesFailed {
            attempted: stats.attempts,
            outcomes: stats.per_strategy_outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_breaker::CircuitState;
    use archive_providers::{StrategyHealth, StrategyResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockStrategy {
        name: &'static str,
        healthy: bool,
        behavior: MockBehavior,
        calls: AtomicUsize,
        min_duration: std::time::Duration,
    }

    enum MockBehavior {
        Succeed(Vec<Capture>),
        FailTransient,
        FailClient,
    }

    #[async_trait]
    impl QueryStrategy for MockStrategy {
        fn name(&self) -> &str {
            self.name
        }

        async fn query(
            &self,
            _domain: &str,
            _from_date: DateTime<Utc>,
            _to_date: DateTime<Utc>,
            _opts: &QueryOptions,
        ) -> Result<StrategyResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                MockBehavior::Succeed(captures) => Ok(StrategyResult {
                    captures: captures.clone(),
                    resume_key: None,
                    latency_ms: 1,
                }),
                MockBehavior::FailTransient => Err(ArchiveError::Transient("mock failure".into())),
                MockBehavior::FailClient => Err(ArchiveError::ClientError("mock 404".into())),
            }
        }

        async fn health(&self) -> StrategyHealth {
            StrategyHealth {
                healthy: self.healthy,
                breaker_state: CircuitState::Closed,
                avg_latency_ms: 0.0,
            }
        }

        fn min_duration(&self) -> std::time::Duration {
            self.min_duration
        }
    }

    fn mock(name: &'static str, healthy: bool, behavior: MockBehavior) -> Arc<dyn QueryStrategy> {
        mock_with_min_duration(name, healthy, behavior, std::time::Duration::from_millis(500))
    }

    fn mock_with_min_duration(
        name: &'static str,
        healthy: bool,
        behavior: MockBehavior,
        min_duration: std::time::Duration,
    ) -> Arc<dyn QueryStrategy> {
        Arc::new(MockStrategy {
            name,
            healthy,
            behavior,
            min_duration,
            calls: AtomicUsize::new(0),
        })
    }

    fn sample_capture() -> Capture {
        Capture::from_wayback("20240115120000 https://example.com/a text/html 200 ABC 4096")
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        let from = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let to = DateTime::parse_from_rfc3339("2024-12-31T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        (from, to)
    }

    #[tokio::test]
    async fn first_healthy_successful_strategy_wins() {
        let strategies = vec![
            mock("primary_cdx", true, MockBehavior::Succeed(vec![sample_capture()])),
            mock("primary_columnar", true, MockBehavior::Succeed(vec![])),
            mock("proxied_columnar", true, MockBehavior::Succeed(vec![])),
            mock("direct_index", true, MockBehavior::Succeed(vec![])),
            mock("secondary", true, MockBehavior::Succeed(vec![])),
        ];
        let router = ArchiveRouter::new(strategies, FilterConfig::default());
        let (from, to) = window();
        let (captures, stats) = router
            .query_unified("example.com", from, to, Preference::Hybrid, Deadline::after(std::time::Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(captures.len(), 1);
        assert_eq!(stats.successful_strategy.as_deref(), Some("primary_cdx"));
        assert_eq!(stats.attempts, 1);
    }

    #[tokio::test]
    async fn transient_failure_falls_through_to_next_strategy() {
        let strategies = vec![
            mock("primary_cdx", true, MockBehavior::FailTransient),
            mock("primary_columnar", true, MockBehavior::Succeed(vec![sample_capture()])),
            mock("proxied_columnar", true, MockBehavior::Succeed(vec![])),
            mock("direct_index", true, MockBehavior::Succeed(vec![])),
            mock("secondary", true, MockBehavior::Succeed(vec![])),
        ];
        let router = ArchiveRouter::new(strategies, FilterConfig::default());
        let (from, to) = window();
        let (captures, stats) = router
            .query_unified("example.com", from, to, Preference::CommonCrawl, Deadline::after(std::time::Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(captures.len(), 1);
        assert_eq!(stats.attempts, 2);
    }

    #[tokio::test]
    async fn client_error_falls_through_to_next_strategy() {
        // A 404-style refusal from one provider doesn't mean the domain is
        // absent from the next one, so the router keeps going.
        let strategies = vec![
            mock("primary_cdx", true, MockBehavior::FailClient),
            mock("primary_columnar", true, MockBehavior::Succeed(vec![])),
            mock("proxied_columnar", true, MockBehavior::Succeed(vec![])),
            mock("direct_index", true, MockBehavior::Succeed(vec![])),
            mock("secondary", true, MockBehavior::Succeed(vec![sample_capture()])),
        ];
        let router = ArchiveRouter::new(strategies, FilterConfig::default());
        let (from, to) = window();
        let (captures, stats) = router
            .query_unified("example.com", from, to, Preference::Wayback, Deadline::after(std::time::Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(captures.len(), 1);
        assert_eq!(stats.attempts, 2);
    }

    #[tokio::test]
    async fn all_strategies_client_error_yields_all_sources_failed_with_no_breaker_trips() {
        let strategies = vec![
            mock("primary_cdx", true, MockBehavior::FailClient),
            mock("primary_columnar", true, MockBehavior::FailClient),
            mock("proxied_columnar", true, MockBehavior::FailClient),
            mock("direct_index", true, MockBehavior::FailClient),
            mock("secondary", true, MockBehavior::FailClient),
        ];
        let router = ArchiveRouter::new(strategies, FilterConfig::default());
        let (from, to) = window();
        let result = router
            .query_unified("example-nodata.test", from, to, Preference::Hybrid, Deadline::after(std::time::Duration::from_secs(5)))
            .await;
        match result {
            Err(ArchiveError::AllSourcesFailed { attempted, outcomes }) => {
                assert_eq!(attempted, 5);
                assert_eq!(outcomes.len(), 5);
                assert!(outcomes.iter().all(|o| o.kind.as_deref() == Some("ClientError")));
            }
            other => panic!("expected AllSourcesFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn all_strategies_failing_yields_all_sources_failed() {
        let strategies = vec![
            mock("primary_cdx", true, MockBehavior::FailTransient),
            mock("primary_columnar", true, MockBehavior::FailTransient),
            mock("proxied_columnar", true, MockBehavior::FailTransient),
            mock("direct_index", true, MockBehavior::FailTransient),
            mock("secondary", true, MockBehavior::FailTransient),
        ];
        let router = ArchiveRouter::new(strategies, FilterConfig::default());
        let (from, to) = window();
        let result = router
            .query_unified("example.com", from, to, Preference::Hybrid, Deadline::after(std::time::Duration::from_secs(5)))
            .await;
        assert!(matches!(result, Err(ArchiveError::AllSourcesFailed { attempted: 5, .. })));
    }

    #[tokio::test]
    async fn strategy_with_open_breaker_is_skipped() {
        let strategies = vec![
            mock("primary_cdx", false, MockBehavior::Succeed(vec![sample_capture()])),
            mock("primary_columnar", true, MockBehavior::Succeed(vec![])),
            mock("proxied_columnar", true, MockBehavior::Succeed(vec![])),
            mock("direct_index", true, MockBehavior::Succeed(vec![])),
            mock("secondary", true, MockBehavior::Succeed(vec![sample_capture()])),
        ];
        let router = ArchiveRouter::new(strategies, FilterConfig::default());
        let (from, to) = window();
        let (_, stats) = router
            .query_unified("example.com", from, to, Preference::Wayback, Deadline::after(std::time::Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(stats.successful_strategy.as_deref(), Some("secondary"));
    }

    #[tokio::test]
    async fn already_expired_deadline_short_circuits() {
        let strategies = vec![
            mock("primary_cdx", true, MockBehavior::Succeed(vec![])),
            mock("primary_columnar", true, MockBehavior::Succeed(vec![])),
            mock("proxied_columnar", true, MockBehavior::Succeed(vec![])),
            mock("direct_index", true, MockBehavior::Succeed(vec![])),
            mock("secondary", true, MockBehavior::Succeed(vec![])),
        ];
        let router = ArchiveRouter::new(strategies, FilterConfig::default());
        let (from, to) = window();
        let result = router
            .query_unified("example.com", from, to, Preference::Hybrid, Deadline::after(std::time::Duration::from_millis(0)))
            .await;
        assert!(matches!(result, Err(ArchiveError::DeadlineExceeded { .. })));
    }

    #[tokio::test]
    async fn strategy_requiring_more_budget_than_remains_is_skipped_not_attempted() {
        let strategies = vec![
            mock_with_min_duration(
                "primary_cdx",
                true,
                MockBehavior::Succeed(vec![sample_capture()]),
                std::time::Duration::from_secs(10),
            ),
            mock("primary_columnar", true, MockBehavior::Succeed(vec![])),
            mock("proxied_columnar", true, MockBehavior::Succeed(vec![])),
            mock("direct_index", true, MockBehavior::Succeed(vec![])),
            mock("secondary", true, MockBehavior::Succeed(vec![sample_capture()])),
        ];
        let router = ArchiveRouter::new(strategies, FilterConfig::default());
        let (from, to) = window();
        let (captures, stats) = router
            .query_unified("example.com", from, to, Preference::Wayback, Deadline::after(std::time::Duration::from_secs(1)))
            .await
            .unwrap();
        // primary_cdx needs 10s of budget but only ~1s remains, so the
        // router moves straight to secondary without attempting it.
        assert_eq!(captures.len(), 1);
        assert_eq!(stats.successful_strategy.as_deref(), Some("secondary"));
        assert_eq!(stats.attempts, 1);
    }

    #[tokio::test]
    async fn disabled_fallback_returns_first_attempt_failure_without_trying_next() {
        let strategies = vec![
            mock("primary_cdx", true, MockBehavior::FailTransient),
            mock("primary_columnar", true, MockBehavior::Succeed(vec![sample_capture()])),
            mock("proxied_columnar", true, MockBehavior::Succeed(vec![])),
            mock("direct_index", true, MockBehavior::Succeed(vec![])),
            mock("secondary", true, MockBehavior::Succeed(vec![])),
        ];
        let router = ArchiveRouter::with_fallback_policy(
            strategies,
            FilterConfig::default(),
            FallbackPolicy {
                enabled: false,
                ..FallbackPolicy::default()
            },
        );
        let (from, to) = window();
        let result = router
            .query_unified("example.com", from, to, Preference::CommonCrawl, Deadline::after(Duration::from_secs(5)))
            .await;
        match result {
            Err(ArchiveError::AllSourcesFailed { attempted, .. }) => assert_eq!(attempted, 1),
            other => panic!("expected AllSourcesFailed after a single attempt, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn max_fallback_attempts_caps_the_number_of_strategies_tried() {
        let strategies = vec![
            mock("primary_cdx", true, MockBehavior::FailTransient),
            mock("primary_columnar", true, MockBehavior::FailTransient),
            mock("proxied_columnar", true, MockBehavior::Succeed(vec![sample_capture()])),
            mock("direct_index", true, MockBehavior::Succeed(vec![])),
            mock("secondary", true, MockBehavior::Succeed(vec![])),
        ];
        let router = ArchiveRouter::with_fallback_policy(
            strategies,
            FilterConfig::default(),
            FallbackPolicy {
                enabled: true,
                delay: Duration::from_secs(0),
                max_attempts: 2,
            },
        );
        let (from, to) = window();
        let result = router
            .query_unified("example.com", from, to, Preference::Hybrid, Deadline::after(Duration::from_secs(5)))
            .await;
        match result {
            Err(ArchiveError::AllSourcesFailed { attempted, .. }) => assert_eq!(attempted, 2),
            other => panic!("expected AllSourcesFailed after hitting the attempt cap, got {other:?}"),
        }
    }
}

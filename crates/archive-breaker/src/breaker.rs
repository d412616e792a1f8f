use archive_common::error::{ArchiveError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub max_recovery_timeout: Duration,
    pub half_open_max_probes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            max_recovery_timeout: Duration::from_secs(480),
            half_open_max_probes: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerStats {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub rejected_calls: u64,
    pub consecutive_failures: u32,
    pub circuit_opened_count: u32,
}

struct Inner {
    state: CircuitState,
    stats: CircuitBreakerStats,
    opened_at: Option<Instant>,
    current_recovery_timeout: Duration,
    half_open_probes_issued: u32,
    half_open_probes_succeeded: u32,
}

/// Circuit breaker for one outbound dependency (one archive strategy, one
/// extractor tier, spec §4.3). `CLOSED -> OPEN` after `failure_threshold`
/// consecutive countable failures; `OPEN -> HALF_OPEN` after
/// `recovery_timeout`; `HALF_OPEN` admits up to `half_open_max_probes`
/// concurrent calls and closes only once all of them have succeeded. Any
/// half-open failure reopens the circuit and doubles the recovery timeout,
/// capped at `max_recovery_timeout`.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Arc<RwLock<Inner>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(breaker = %name, threshold = config.failure_threshold, "circuit breaker initialized");
        let recovery_timeout = config.recovery_timeout;
        Self {
            name,
            config,
            inner: Arc::new(RwLock::new(Inner {
                state: CircuitState::Closed,
                stats: CircuitBreakerStats::default(),
                opened_at: None,
                current_recovery_timeout: recovery_timeout,
                half_open_probes_issued: 0,
                half_open_probes_succeeded: 0,
            })),
        }
    }

    /// Execute `operation` under this breaker's protection. Rejects
    /// immediately with `ArchiveError::CircuitOpen` when the circuit is open
    /// and not yet eligible for a probe (spec §4.3).
    #[tracing::instrument(skip_all, fields(breaker = %self.name))]
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.should_allow_request().await {
            let mut inner = self.inner.write().await;
            inner.stats.rejected_calls += 1;
            debug!(breaker = %self.name, "rejecting call, circuit open");
            return Err(ArchiveError::CircuitOpen {
                strategy: self.name.clone(),
            });
        }

        {
            let mut inner = self.inner.write().await;
            inner.stats.total_calls += 1;
        }

        let result = operation().await;
        self.on_result(&result).await;
        result
    }

    async fn should_allow_request(&self) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.write().await;

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let Some(opened_at) = inner.opened_at else {
                    return false;
                };
                if now.duration_since(opened_at) >= inner.current_recovery_timeout {
                    info!(breaker = %self.name, "transitioning to half-open");
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_probes_issued = 0;
                    inner.half_open_probes_succeeded = 0;
                    inner.half_open_probes_issued += 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_probes_issued < self.config.half_open_max_probes {
                    inner.half_open_probes_issued += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    async fn on_result<T>(&self, result: &Result<T>) {
        let mut inner = self.inner.write().await;
        match result {
            Ok(_) => {
                inner.stats.successful_calls += 1;
                self.on_success(&mut inner);
            }
            Err(err) => {
                if err.kind().counts_toward_breaker() {
                    inner.stats.failed_calls += 1;
                    self.on_failure(&mut inner);
                } else {
                    debug!(breaker = %self.name, "non-countable failure, breaker unaffected");
                }
            }
        }
    }

    fn on_success(&self, inner: &mut Inner) {
        match inner.state {
            CircuitState::HalfOpen => {
                inner.half_open_probes_succeeded += 1;
                if inner.half_open_probes_succeeded >= self.config.half_open_max_probes {
                    info!(breaker = %self.name, "closing after successful recovery probes");
                    inner.state = CircuitState::Closed;
                    inner.stats.consecutive_failures = 0;
                    inner.opened_at = None;
                    inner.current_recovery_timeout = self.config.recovery_timeout;
                }
            }
            CircuitState::Closed => {
                inner.stats.consecutive_failures = 0;
            }
            CircuitState::Open => {
                warn!(breaker = %self.name, "unexpected success while open");
            }
        }
    }

    fn on_failure(&self, inner: &mut Inner) {
        inner.stats.consecutive_failures += 1;

        match inner.state {
            CircuitState::Closed => {
                if inner.stats.consecutive_failures >= self.config.failure_threshold {
                    warn!(breaker = %self.name, failures = inner.stats.consecutive_failures, "opening circuit");
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.current_recovery_timeout = self.config.recovery_timeout;
                    inner.stats.circuit_opened_count += 1;
                }
            }
            CircuitState::HalfOpen => {
                warn!(breaker = %self.name, "reopening after half-open failure, doubling recovery timeout");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.current_recovery_timeout = std::cmp::min(
                    inner.current_recovery_timeout * 2,
                    self.config.max_recovery_timeout,
                );
                inner.stats.circuit_opened_count += 1;
                inner.half_open_probes_issued = 0;
                inner.half_open_probes_succeeded = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.read().await.state
    }

    pub async fn stats(&self) -> CircuitBreakerStats {
        self.inner.read().await.stats.clone()
    }

    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        inner.state = CircuitState::Closed;
        inner.stats.consecutive_failures = 0;
        inner.opened_at = None;
        inner.current_recovery_timeout = self.config.recovery_timeout;
        inner.half_open_probes_issued = 0;
        inner.half_open_probes_succeeded = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: u32, timeout_ms: u64, max_timeout_ms: u64, probes: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: threshold,
            recovery_timeout: Duration::from_millis(timeout_ms),
            max_recovery_timeout: Duration::from_millis(max_timeout_ms),
            half_open_max_probes: probes,
        }
    }

    #[tokio::test]
    async fn starts_closed() {
        let breaker = CircuitBreaker::new("test", CircuitBreakerConfig::default());
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new("test", config(2, 10_000, 60_000, 1));
        for _ in 0..2 {
            let _ = breaker
                .call(|| async { Err::<(), _>(ArchiveError::Transient("boom".into())) })
                .await;
        }
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn client_error_never_opens_circuit() {
        let breaker = CircuitBreaker::new("test", config(2, 10_000, 60_000, 1));
        for _ in 0..5 {
            let _ = breaker
                .call(|| async { Err::<(), _>(ArchiveError::ClientError("404".into())) })
                .await;
        }
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens_and_doubles_timeout() {
        let breaker = CircuitBreaker::new("test", config(1, 100, 10_000, 1));
        let _ = breaker
            .call(|| async { Err::<(), _>(ArchiveError::Transient("boom".into())) })
            .await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        tokio::time::advance(Duration::from_millis(150)).await;
        let _ = breaker
            .call(|| async { Err::<(), _>(ArchiveError::Transient("still broken".into())) })
            .await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        // the timeout should have doubled: 100ms is no longer enough.
        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(!breaker.should_allow_request().await);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_success_closes_circuit() {
        let breaker = CircuitBreaker::new("test", config(1, 100, 10_000, 1));
        let _ = breaker
            .call(|| async { Err::<(), _>(ArchiveError::Transient("boom".into())) })
            .await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        tokio::time::advance(Duration::from_millis(150)).await;
        let result = breaker.call(|| async { Ok::<_, ArchiveError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn open_circuit_rejects_without_invoking_operation() {
        let breaker = CircuitBreaker::new("test", config(1, 60_000, 120_000, 1));
        let _ = breaker
            .call(|| async { Err::<(), _>(ArchiveError::Transient("boom".into())) })
            .await;

        let mut invoked = false;
        let result = breaker
            .call(|| async {
                invoked = true;
                Ok::<_, ArchiveError>(())
            })
            .await;
        assert!(!invoked);
        assert!(matches!(result, Err(ArchiveError::CircuitOpen { .. })));
    }
}

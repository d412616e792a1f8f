use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyRotationPolicy {
    /// Pick uniformly at random per request (spec §4.5.3 default).
    UniformRandom,
    /// Cycle through available endpoints in order.
    RoundRobin,
}

impl Default for ProxyRotationPolicy {
    fn default() -> Self {
        Self::UniformRandom
    }
}

struct BackoffState {
    consecutive_failures: u32,
    cooldown_until: Option<Instant>,
}

/// Rotating pool of authenticated proxy endpoints used by the proxied
/// columnar-index strategy (spec §4.5.3). Rotation picks a proxy uniformly
/// at random per request; repeated proxy-level errors put that proxy on an
/// exponential-backoff cooldown instead of removing it from the pool.
pub struct ProxyPool {
    endpoints: Vec<String>,
    policy: ProxyRotationPolicy,
    backoff: Mutex<HashMap<String, BackoffState>>,
    base_backoff: Duration,
    max_backoff: Duration,
    round_robin_cursor: AtomicUsize,
}

impl ProxyPool {
    pub fn new(endpoints: Vec<String>, policy: ProxyRotationPolicy) -> Self {
        Self {
            endpoints,
            policy,
            backoff: Mutex::new(HashMap::new()),
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            round_robin_cursor: AtomicUsize::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Pick a proxy endpoint not currently in cooldown. Returns `None` if
    /// every endpoint is cooling down or the pool is empty.
    pub fn pick(&self) -> Option<String> {
        let now = Instant::now();
        let backoff = self.backoff.lock().expect("proxy backoff lock poisoned");

        let available: Vec<&String> = self
            .endpoints
            .iter()
            .filter(|endpoint| {
                backoff
                    .get(*endpoint)
                    .and_then(|state| state.cooldown_until)
                    .map(|until| now >= until)
                    .unwrap_or(true)
            })
            .collect();

        if available.is_empty() {
            return None;
        }

        match self.policy {
            ProxyRotationPolicy::UniformRandom => {
                available.choose(&mut rand::thread_rng()).map(|s| (*s).clone())
            }
            ProxyRotationPolicy::RoundRobin => {
                let index = self.round_robin_cursor.fetch_add(1, Ordering::Relaxed) % available.len();
                Some(available[index].clone())
            }
        }
    }

    pub fn record_success(&self, endpoint: &str) {
        let mut backoff = self.backoff.lock().expect("proxy backoff lock poisoned");
        backoff.remove(endpoint);
    }

    pub fn record_failure(&self, endpoint: &str) {
        let mut backoff = self.backoff.lock().expect("proxy backoff lock poisoned");
        let state = backoff.entry(endpoint.to_string()).or_insert(BackoffState {
            consecutive_failures: 0,
            cooldown_until: None,
        });
        state.consecutive_failures += 1;
        let delay = self.base_backoff * 2u32.saturating_pow(state.consecutive_failures - 1);
        let delay = std::cmp::min(delay, self.max_backoff);
        state.cooldown_until = Some(Instant::now() + delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_picks_nothing() {
        let pool = ProxyPool::new(vec![], ProxyRotationPolicy::UniformRandom);
        assert!(pool.pick().is_none());
    }

    #[test]
    fn single_endpoint_pool_always_picks_it() {
        let pool = ProxyPool::new(vec!["proxy-a".to_string()], ProxyRotationPolicy::UniformRandom);
        assert_eq!(pool.pick(), Some("proxy-a".to_string()));
    }

    #[test]
    fn failure_puts_endpoint_in_cooldown() {
        let pool = ProxyPool::new(vec!["proxy-a".to_string()], ProxyRotationPolicy::UniformRandom);
        pool.record_failure("proxy-a");
        assert!(pool.pick().is_none());
    }

    #[test]
    fn success_clears_cooldown() {
        let pool = ProxyPool::new(vec!["proxy-a".to_string()], ProxyRotationPolicy::UniformRandom);
        pool.record_failure("proxy-a");
        pool.record_success("proxy-a");
        assert_eq!(pool.pick(), Some("proxy-a".to_string()));
    }

    #[test]
    fn healthy_endpoint_remains_selectable_despite_others_cooling_down() {
        let pool = ProxyPool::new(
            vec!["proxy-a".to_string(), "proxy-b".to_string()],
            ProxyRotationPolicy::UniformRandom,
        );
        pool.record_failure("proxy-a");
        assert_eq!(pool.pick(), Some("proxy-b".to_string()));
    }

    #[test]
    fn round_robin_cycles_through_endpoints_in_order() {
        let pool = ProxyPool::new(
            vec!["proxy-a".to_string(), "proxy-b".to_string(), "proxy-c".to_string()],
            ProxyRotationPolicy::RoundRobin,
        );
        let picks: Vec<String> = (0..6).map(|_| pool.pick().unwrap()).collect();
        assert_eq!(
            picks,
            vec!["proxy-a", "proxy-b", "proxy-c", "proxy-a", "proxy-b", "proxy-c"]
        );
    }

    #[test]
    fn round_robin_skips_endpoints_in_cooldown() {
        let pool = ProxyPool::new(
            vec!["proxy-a".to_string(), "proxy-b".to_string()],
            ProxyRotationPolicy::RoundRobin,
        );
        pool.record_failure("proxy-a");
        assert_eq!(pool.pick(), Some("proxy-b".to_string()));
        assert_eq!(pool.pick(), Some("proxy-b".to_string()));
    }
}

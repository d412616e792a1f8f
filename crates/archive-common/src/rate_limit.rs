//! Leaky-bucket rate limiter shared by the Primary CDX strategy (spec
//! §4.5.1) and the extractor's archive reach-through tier (spec §4.7).
//!
//! Modeled per spec §9's re-architecture note: a FIFO channel of tickets, a
//! single scheduler task that releases them at a fixed cadence. Callers
//! queue in arrival order; there is no priority within one limiter.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::{ArchiveError, Result};

pub struct LeakyBucketLimiter {
    tickets: mpsc::Sender<oneshot::Sender<()>>,
}

impl LeakyBucketLimiter {
    /// `requests_per_minute` and `min_interval` both bound the cadence; the
    /// wider of the two wins, matching spec §4.7's "≤4s minimum inter-request
    /// spacing" on top of a 15/min ceiling.
    pub fn new(requests_per_minute: u32, min_interval: Duration) -> Self {
        let per_request = Duration::from_secs_f64(60.0 / requests_per_minute.max(1) as f64);
        let interval = per_request.max(min_interval);

        let (tx, rx) = mpsc::channel(4096);
        tokio::spawn(Self::run_scheduler(rx, interval));
        Self { tickets: tx }
    }

    async fn run_scheduler(mut rx: mpsc::Receiver<oneshot::Sender<()>>, interval: Duration) {
        info!(?interval, "rate limiter scheduler started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while let Some(waiter) = rx.recv().await {
            ticker.tick().await;
            // Ignore send failures: the waiter gave up (cancelled/timed out)
            // and dropped its receiver; the ticket is simply not collected.
            let _ = waiter.send(());
        }
        info!("rate limiter scheduler stopped: all senders dropped");
    }

    /// Enqueue a ticket and wait for it, failing with `RateLimited` if the
    /// deadline elapses first. FIFO across concurrent callers because the
    /// underlying `mpsc` channel preserves send order and the scheduler
    /// drains it strictly in order.
    pub async fn acquire(&self, deadline: Option<Instant>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.tickets
            .send(tx)
            .await
            .map_err(|_| ArchiveError::UpstreamUnavailable("rate limiter scheduler stopped".into()))?;

        match deadline {
            Some(at) => {
                let remaining = at.saturating_duration_since(Instant::now());
                match tokio::time::timeout(remaining, rx).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => Err(ArchiveError::UpstreamUnavailable(
                        "rate limiter scheduler stopped".into(),
                    )),
                    Err(_) => {
                        debug!("rate limiter wait exceeded deadline");
                        Err(ArchiveError::RateLimited)
                    }
                }
            }
            None => rx.await.map_err(|_| {
                ArchiveError::UpstreamUnavailable("rate limiter scheduler stopped".into())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn tickets_are_spaced_by_interval() {
        let limiter = Arc::new(LeakyBucketLimiter::new(60, Duration::from_millis(0)));
        // 60/min == 1 per second.
        let start = Instant::now();
        limiter.acquire(None).await.unwrap();
        limiter.acquire(None).await.unwrap();
        assert!(Instant::now() - start >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_in_the_past_yields_rate_limited() {
        let limiter = LeakyBucketLimiter::new(1, Duration::from_secs(60));
        limiter.acquire(None).await.unwrap(); // drains the first immediate tick
        let deadline = Instant::now() + Duration::from_millis(1);
        let result = limiter.acquire(Some(deadline)).await;
        assert!(matches!(result, Err(ArchiveError::RateLimited)));
    }
}

use crate::error::{QueryRouterError, Result};
use archive_common::Priority;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// `LOW` priority is "unbounded-but-queued" (spec §4.9) — modeled as a very
/// large quota rather than a literally infinite one, so a single runaway
/// caller still can't exhaust process memory with outstanding permits.
const LOW_PRIORITY_QUOTA: usize = 100_000;

/// Per-priority concurrency caps enforced before any upstream call is
/// issued (spec §4.9's resource quotas). `CRITICAL` requests still take a
/// permit from their own semaphore but never wait behind other
/// priorities' queues, since each tier owns an independent semaphore.
pub struct AdmissionController {
    critical: Arc<Semaphore>,
    high: Arc<Semaphore>,
    normal: Arc<Semaphore>,
    low: Arc<Semaphore>,
}

/// Held for the lifetime of one admitted request; dropping it releases
/// the slot. Cancellation before acquisition never consumes a permit.
pub struct AdmissionGuard(#[allow(dead_code)] OwnedSemaphorePermit);

impl AdmissionController {
    pub fn new(critical: usize, high: usize, normal: usize) -> Self {
        Self {
            critical: Arc::new(Semaphore::new(critical)),
            high: Arc::new(Semaphore::new(high)),
            normal: Arc::new(Semaphore::new(normal)),
            low: Arc::new(Semaphore::new(LOW_PRIORITY_QUOTA)),
        }
    }

    fn semaphore_for(&self, priority: Priority) -> &Arc<Semaphore> {
        match priority {
            Priority::Critical => &self.critical,
            Priority::High => &self.high,
            Priority::Normal => &self.normal,
            Priority::Low => &self.low,
        }
    }

    /// Acquire an admission slot, honoring cancellation: if `cancel` fires
    /// first, no permit is consumed and `QueryRouterError::Cancelled` is
    /// returned (spec §5's cancellation unwind policy).
    pub async fn acquire(&self, priority: Priority, cancel: &CancellationToken) -> Result<AdmissionGuard> {
        let semaphore = self.semaphore_for(priority).clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(QueryRouterError::Cancelled),
            permit = semaphore.acquire_owned() => {
                let permit = permit.map_err(|_| QueryRouterError::CapacityExceeded(
                    "admission semaphore closed".to_string(),
                ))?;
                Ok(AdmissionGuard(permit))
            }
        }
    }

    /// Non-blocking admission check, used when the caller wants to fail
    /// fast rather than queue (e.g. `CRITICAL` under a hard SLA).
    pub fn try_acquire(&self, priority: Priority) -> Result<AdmissionGuard> {
        self.semaphore_for(priority)
            .clone()
            .try_acquire_owned()
            .map(AdmissionGuard)
            .map_err(|_| QueryRouterError::CapacityExceeded(format!("{priority} quota saturated")))
    }
}

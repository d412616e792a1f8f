use crate::event::SyncEvent;
use archive_common::error::Result;
use async_trait::async_trait;

/// The OLTP store's change-stream contract consumed by C10 (spec §6):
/// ordered, at-least-once, resumable by last-acknowledged `seq`. A
/// source-side implementation (e.g. Postgres logical replication, a
/// polling outbox table) lives outside this crate; this trait is the seam
/// the sync consumer is tested against.
#[async_trait]
pub trait ChangeStreamSource: Send + Sync {
    /// Pull up to `max` events at or after `from_seq` (exclusive). Returns
    /// an empty vec if nothing new is available — never blocks.
    async fn next_batch(&self, from_seq: i64, max: usize) -> Result<Vec<SyncEvent>>;

    /// Acknowledge that every event up to and including `seq` has been
    /// durably applied; the source may now throttle or resume from here.
    async fn ack(&self, seq: i64) -> Result<()>;
}

/// In-memory source used by tests and local demos: a fixed, pre-seeded
/// event log plus an ack watermark.
pub struct InMemorySource {
    events: Vec<SyncEvent>,
    acked_seq: std::sync::atomic::AtomicI64,
}

impl InMemorySource {
    pub fn new(events: Vec<SyncEvent>) -> Self {
        Self {
            events,
            acked_seq: std::sync::atomic::AtomicI64::new(0),
        }
    }

    pub fn acked_seq(&self) -> i64 {
        self.acked_seq.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeStreamSource for InMemorySource {
    async fn next_batch(&self, from_seq: i64, max: usize) -> Result<Vec<SyncEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.seq > from_seq)
            .take(max)
            .cloned()
            .collect())
    }

    async fn ack(&self, seq: i64) -> Result<()> {
        self.acked_seq.store(seq, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

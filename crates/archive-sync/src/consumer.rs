use crate::event::{Op, SyncEvent};
use crate::source::ChangeStreamSource;
use archive_common::config::SyncConfig;
use archive_common::error::Result;
use archive_storage::OlapSink;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const MIN_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsumerStats {
    pub events_applied: usize,
    pub last_seq: i64,
    pub current_batch_size: usize,
    pub max_staleness_ms: i64,
}

struct ConsumerState {
    last_seq: i64,
    current_batch_size: usize,
}

/// Applies an OLTP change stream to the OLAP engine with at-least-once
/// delivery, per-pk ordering, and batch-size backpressure (spec §4.10).
///
/// Events are applied strictly in `seq` order, which trivially preserves
/// per-pk order (a subsequence of a totally ordered sequence is ordered)
/// without needing a separate per-pk scheduler.
pub struct SyncConsumer {
    source: Arc<dyn ChangeStreamSource>,
    sink: Arc<dyn OlapSink>,
    config: SyncConfig,
    state: Mutex<ConsumerState>,
}

impl SyncConsumer {
    pub fn new(source: Arc<dyn ChangeStreamSource>, sink: Arc<dyn OlapSink>, config: SyncConfig) -> Self {
        let batch_size = config.batch_size;
        Self {
            source,
            sink,
            config,
            state: Mutex::new(ConsumerState {
                last_seq: 0,
                current_batch_size: batch_size,
            }),
        }
    }

    /// Resume from a previously persisted `seq` (spec §4.10 recovery).
    pub async fn resume_from(&self, seq: i64) {
        self.state.lock().await.last_seq = seq;
    }

    /// Fetch and apply one batch. Returns `events_applied == 0` when the
    /// source has nothing new.
    pub async fn run_once(&self) -> Result<ConsumerStats> {
        let mut state = self.state.lock().await;
        let request_size = state.current_batch_size;
        let events = self.source.next_batch(state.last_seq, request_size).await?;

        if events.is_empty() {
            return Ok(ConsumerStats {
                events_applied: 0,
                last_seq: state.last_seq,
                current_batch_size: state.current_batch_size,
                max_staleness_ms: 0,
            });
        }

        let now = Utc::now();
        let mut max_staleness_ms = 0i64;
        for event in &events {
            Self::apply(&self.sink, event).await?;
            state.last_seq = event.seq;
            let staleness = (now - event.committed_at).num_milliseconds().max(0);
            max_staleness_ms = max_staleness_ms.max(staleness);
        }

        self.source.ack(state.last_seq).await?;

        if max_staleness_ms > (self.config.staleness_budget_s as i64) * 1_000 {
            warn!(max_staleness_ms, budget_s = self.config.staleness_budget_s, "sync staleness budget exceeded");
        }

        // The trait doesn't expose true queue depth, so a full batch is
        // the proxy for "still backlogged": shrink the next request
        // instead of ever dropping events. An under-full batch means the
        // source has drained, so grow back toward the configured size.
        let batch_was_full = events.len() >= request_size;
        if batch_was_full {
            let floor = MIN_BATCH_SIZE.min(self.config.batch_size);
            state.current_batch_size = (state.current_batch_size / 2).max(floor);
            debug!(new_batch_size = state.current_batch_size, "shrinking sync batch size under backpressure");
        } else {
            state.current_batch_size = (state.current_batch_size * 2).min(self.config.batch_size);
        }

        Ok(ConsumerStats {
            events_applied: events.len(),
            last_seq: state.last_seq,
            current_batch_size: state.current_batch_size,
            max_staleness_ms,
        })
    }

    /// Drive `run_once` in a loop until `cancel` fires, sleeping briefly
    /// between empty polls.
    pub async fn run(&self, cancel: CancellationToken, poll_interval: std::time::Duration) {
        info!("sync consumer loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.run_once() => {
                    match result {
                        Ok(stats) if stats.events_applied == 0 => {
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                _ = tokio::time::sleep(poll_interval) => {}
                            }
                        }
                        Ok(stats) => {
                            debug!(applied = stats.events_applied, last_seq = stats.last_seq, "sync batch applied");
                        }
                        Err(e) => {
                            warn!(error = %e, "sync consumer batch failed, retrying after interval");
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                _ = tokio::time::sleep(poll_interval) => {}
                            }
                        }
                    }
                }
            }
        }
        info!("sync consumer loop stopped");
    }

    async fn apply(sink: &Arc<dyn OlapSink>, event: &SyncEvent) -> Result<()> {
        let committed_at = event.committed_at.to_rfc3339();
        match event.op {
            Op::Delete => sink.tombstone(&event.table, &event.pk, event.seq, &committed_at).await,
            Op::Insert | Op::Update => {
                let payload = event.after_image.clone().unwrap_or(Value::Null);
                sink.upsert(&event.table, &event.pk, event.seq, &payload, &committed_at).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;
    use archive_common::error::Result as ArchiveResult;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as TokioMutex;

    #[derive(Default)]
    struct MockSink {
        applied: TokioMutex<Vec<(String, String, i64, bool)>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OlapSink for MockSink {
        async fn upsert(&self, table: &str, pk: &str, seq: i64, _payload: &Value, _committed_at: &str) -> ArchiveResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.applied.lock().await.push((table.to_string(), pk.to_string(), seq, false));
            Ok(())
        }
        async fn tombstone(&self, table: &str, pk: &str, seq: i64, _committed_at: &str) -> ArchiveResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.applied.lock().await.push((table.to_string(), pk.to_string(), seq, true));
            Ok(())
        }
    }

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).unwrap()
    }

    fn event(seq: i64, pk: &str, op: Op) -> SyncEvent {
        SyncEvent {
            seq,
            table: "captures".to_string(),
            pk: pk.to_string(),
            op,
            after_image: Some(serde_json::json!({"status": 200})),
            committed_at: at(seq),
        }
    }

    #[tokio::test]
    async fn events_are_applied_in_seq_order_per_pk() {
        let events = vec![
            event(1, "a", Op::Insert),
            event(2, "b", Op::Insert),
            event(3, "a", Op::Update),
        ];
        let source = Arc::new(InMemorySource::new(events));
        let sink = Arc::new(MockSink::default());
        let consumer = SyncConsumer::new(source, sink.clone(), SyncConfig::default());

        let stats = consumer.run_once().await.unwrap();
        assert_eq!(stats.events_applied, 3);
        assert_eq!(stats.last_seq, 3);

        let applied = sink.applied.lock().await;
        let a_seqs: Vec<i64> = applied.iter().filter(|(_, pk, _, _)| pk == "a").map(|(_, _, seq, _)| *seq).collect();
        assert_eq!(a_seqs, vec![1, 3]);
    }

    #[tokio::test]
    async fn delete_op_applies_as_tombstone() {
        let source = Arc::new(InMemorySource::new(vec![event(1, "a", Op::Delete)]));
        let sink = Arc::new(MockSink::default());
        let consumer = SyncConsumer::new(source, sink.clone(), SyncConfig::default());
        consumer.run_once().await.unwrap();
        let applied = sink.applied.lock().await;
        assert!(applied[0].3, "expected tombstone flag set");
    }

    #[tokio::test]
    async fn full_batch_shrinks_next_request_size() {
        let mut config = SyncConfig::default();
        config.batch_size = 4;
        let events: Vec<_> = (1..=10).map(|i| event(i, "a", Op::Update)).collect();
        let source = Arc::new(InMemorySource::new(events));
        let sink = Arc::new(MockSink::default());
        let consumer = SyncConsumer::new(source, sink, config);

        let first = consumer.run_once().await.unwrap();
        assert_eq!(first.events_applied, 4);
        assert!(first.current_batch_size < 4, "expected batch size to shrink under a full batch");
    }

    #[tokio::test]
    async fn resume_from_last_seq_skips_already_applied_events() {
        let events = vec![event(1, "a", Op::Insert), event(2, "a", Op::Update)];
        let source = Arc::new(InMemorySource::new(events));
        let sink = Arc::new(MockSink::default());
        let consumer = SyncConsumer::new(source, sink.clone(), SyncConfig::default());
        consumer.resume_from(1).await;

        let stats = consumer.run_once().await.unwrap();
        assert_eq!(stats.events_applied, 1);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_source_yields_zero_applied_without_error() {
        let source = Arc::new(InMemorySource::new(vec![]));
        let sink = Arc::new(MockSink::default());
        let consumer = SyncConsumer::new(source, sink, SyncConfig::default());
        let stats = consumer.run_once().await.unwrap();
        assert_eq!(stats.events_applied, 0);
    }
}

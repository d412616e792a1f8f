use chrono::{DateTime, Utc};
use tracing::warn;

/// Emitted when all four extraction tiers fail for a capture (spec §4.7).
/// The Capture itself is marked `EXTRACTION_FAILED` rather than raising.
#[derive(Debug, Clone)]
pub struct DeadLetterEvent {
    pub url: String,
    pub tiers_attempted: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

pub trait DeadLetterSink: Send + Sync {
    fn emit(&self, event: DeadLetterEvent);
}

/// Default sink: structured-log the event. Callers that need durable
/// dead-letter storage (e.g. a queue or table) provide their own sink.
#[derive(Debug, Default)]
pub struct LoggingDeadLetterSink;

impl DeadLetterSink for LoggingDeadLetterSink {
    fn emit(&self, event: DeadLetterEvent) {
        warn!(
            url = %event.url,
            tiers = ?event.tiers_attempted,
            "extraction dead-lettered: all tiers failed"
        );
    }
}

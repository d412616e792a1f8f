//! C7: tiered content extraction with per-tier breakers and an
//! Archive.org-style rate limiter on the reach-through tier (spec §4.7).

mod cascade;
mod dead_letter;
mod tiers;

pub use cascade::{ExtractionOutcome, ExtractorCascade, ExtractorCascadeConfig};
pub use dead_letter::{DeadLetterEvent, DeadLetterSink, LoggingDeadLetterSink};

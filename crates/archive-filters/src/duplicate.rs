use crate::decision::{FilterCategory, FilterDecision};
use archive_capture::Capture;
use std::collections::HashSet;

/// Dedup key for a capture: `digest` when present, otherwise
/// `(original_url, packed timestamp)` (spec §4.2). `digest` alone is never
/// trustworthy across providers, so it is only ever combined implicitly
/// by being provider-specific content — never compared across sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DedupKey {
    Digest(String),
    UrlTimestamp(String, String),
}

fn dedup_key(capture: &Capture) -> DedupKey {
    match &capture.digest {
        Some(digest) => DedupKey::Digest(digest.clone()),
        None => DedupKey::UrlTimestamp(
            capture.original_url.clone(),
            capture.raw_timestamp.clone(),
        ),
    }
}

/// Fourth filter in the pipeline (spec §4.2 and §5): first occurrence in
/// iteration order wins. Callers must feed captures in source-preference
/// order so the tie-break naturally prefers earlier sources.
pub struct DuplicateTracker {
    seen: HashSet<DedupKey>,
}

impl DuplicateTracker {
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    pub fn check(&mut self, capture: &Capture) -> Option<FilterDecision> {
        let key = dedup_key(capture);
        if self.seen.insert(key) {
            None
        } else {
            Some(FilterDecision::filtered(
                "duplicate of an earlier capture in this batch",
                FilterCategory::Duplicate,
                capture.digest.clone(),
                false,
                5,
            ))
        }
    }
}

impl Default for DuplicateTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_occurrence_is_kept() {
        let capture = Capture::from_wayback(
            "20240115120000 https://example.com/a text/html 200 ABC 100",
        );
        let mut tracker = DuplicateTracker::new();
        assert!(tracker.check(&capture).is_none());
    }

    #[test]
    fn second_occurrence_with_same_digest_is_filtered() {
        let capture = Capture::from_wayback(
            "20240115120000 https://example.com/a text/html 200 ABC 100",
        );
        let mut tracker = DuplicateTracker::new();
        assert!(tracker.check(&capture).is_none());
        assert!(tracker.check(&capture).is_some());
    }

    #[test]
    fn missing_digest_falls_back_to_url_and_timestamp() {
        let a = Capture::from_wayback(
            "20240115120000 https://example.com/a text/html 200 - -",
        );
        let b = Capture::from_wayback(
            "20240115120000 https://example.com/a text/html 200 - -",
        );
        let mut tracker = DuplicateTracker::new();
        assert!(tracker.check(&a).is_none());
        assert!(tracker.check(&b).is_some());
    }

    #[test]
    fn different_timestamps_are_not_duplicates() {
        let a = Capture::from_wayback(
            "20240115120000 https://example.com/a text/html 200 - -",
        );
        let b = Capture::from_wayback(
            "20240116120000 https://example.com/a text/html 200 - -",
        );
        let mut tracker = DuplicateTracker::new();
        assert!(tracker.check(&a).is_none());
        assert!(tracker.check(&b).is_none());
    }

    #[test]
    fn earlier_source_in_preference_order_wins_tie_break() {
        let mut primary = Capture::from_wayback(
            "20240115120000 https://example.com/a text/html 200 ABC 100",
        );
        primary.source = archive_capture::Source::Wayback;
        let mut secondary = primary.clone();
        secondary.source = archive_capture::Source::CommonCrawl;

        let mut tracker = DuplicateTracker::new();
        assert!(tracker.check(&primary).is_none());
        assert!(tracker.check(&secondary).is_some());
    }
}

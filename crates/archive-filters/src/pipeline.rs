use crate::decision::FilterDecision;
use crate::duplicate::DuplicateTracker;
use crate::size_type::SizeTypeThresholds;
use crate::{list_page, size_type, static_asset};
use archive_capture::Capture;

#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub size_type: SizeTypeThresholds,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            size_type: SizeTypeThresholds::default(),
        }
    }
}

/// Applies the fixed-order filter chain (spec §4.2): static-asset →
/// list-page → size/type → duplicate, first-match-wins per capture.
/// Captures must already be in source-preference order so the duplicate
/// filter's tie-break favors the earlier source.
#[tracing::instrument(skip_all, fields(batch_size = captures.len()))]
pub fn apply_filters(captures: &[Capture], config: &FilterConfig) -> Vec<FilterDecision> {
    let mut tracker = DuplicateTracker::new();
    let mut decisions = Vec::with_capacity(captures.len());

    for capture in captures {
        let decision = static_asset::check(capture)
            .or_else(|| list_page::check(capture))
            .or_else(|| size_type::check(capture, &config.size_type))
            .or_else(|| tracker.check(capture))
            .unwrap_or_else(|| FilterDecision::kept(5));
        decisions.push(decision);
    }

    let kept = decisions.iter().filter(|d| d.outcome.is_kept()).count();
    tracing::debug!(kept, filtered = decisions.len() - kept, "filter pipeline complete");

    decisions
}

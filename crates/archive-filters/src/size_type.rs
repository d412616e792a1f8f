use crate::decision::{FilterCategory, FilterDecision};
use archive_capture::Capture;

/// MIME type prefixes that are never content pages even when they survive
/// the static-asset extension check (spec §4.2).
const EXCLUDED_MIME_PREFIXES: &[&str] = &[
    "image/",
    "video/",
    "audio/",
    "font/",
    "application/octet-stream",
    "application/zip",
    "application/x-",
];

#[derive(Debug, Clone, Copy)]
pub struct SizeTypeThresholds {
    pub min_length: u64,
}

impl Default for SizeTypeThresholds {
    fn default() -> Self {
        // Pages below this are almost always redirects or empty error
        // shells rather than real content (spec §4.2 default).
        Self { min_length: 256 }
    }
}

/// Third filter in the pipeline (spec §4.2): drop captures with an error
/// status, excluded MIME type, or implausibly small body length.
pub fn check(capture: &Capture, thresholds: &SizeTypeThresholds) -> Option<FilterDecision> {
    if capture.status_code >= 400 {
        return Some(FilterDecision::filtered(
            format!("http status {}", capture.status_code),
            FilterCategory::SizeType,
            None,
            false,
            1,
        ));
    }

    let mime = capture.mime_type.to_ascii_lowercase();
    if let Some(prefix) = EXCLUDED_MIME_PREFIXES.iter().find(|p| mime.starts_with(**p)) {
        return Some(FilterDecision::filtered(
            format!("excluded mime type {mime}"),
            FilterCategory::SizeType,
            Some((*prefix).to_string()),
            true,
            2,
        ));
    }

    match capture.length {
        None => None,
        Some(length) if length == 0 => Some(FilterDecision::filtered(
            "zero-length body",
            FilterCategory::SizeType,
            None,
            false,
            1,
        )),
        Some(length) if length < thresholds.min_length => Some(FilterDecision::filtered(
            format!("body length {length} below threshold {}", thresholds.min_length),
            FilterCategory::SizeType,
            None,
            true,
            4,
        )),
        Some(_) => None,
    }
}

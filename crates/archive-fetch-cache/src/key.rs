use archive_capture::Source;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fingerprint = SHA-256 of `(original_url, timestamp, source,
/// extractor_version)` (spec §3's Fetch Cache Entry key).
pub fn fingerprint(
    original_url: &str,
    timestamp: DateTime<Utc>,
    source: Source,
    extractor_version: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(original_url.as_bytes());
    hasher.update(b"\0");
    hasher.update(timestamp.timestamp().to_le_bytes());
    hasher.update(b"\0");
    hasher.update(format!("{source:?}").as_bytes());
    hasher.update(b"\0");
    hasher.update(extractor_version.as_bytes());
    hex::encode(hasher.finalize())
}

/// The cached payload for one fingerprint (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheValue {
    pub status: u16,
    pub mime: String,
    pub bytes_or_text: String,
    pub extracted_at: DateTime<Utc>,
    pub tier_used: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_produce_same_fingerprint() {
        let now = Utc::now();
        let a = fingerprint("https://example.com/a", now, Source::Wayback, "v1");
        let b = fingerprint("https://example.com/a", now, Source::Wayback, "v1");
        assert_eq!(a, b);
    }

    #[test]
    fn different_extractor_version_changes_fingerprint() {
        let now = Utc::now();
        let a = fingerprint("https://example.com/a", now, Source::Wayback, "v1");
        let b = fingerprint("https://example.com/a", now, Source::Wayback, "v2");
        assert_ne!(a, b);
    }

    #[test]
    fn different_source_changes_fingerprint() {
        let now = Utc::now();
        let a = fingerprint("https://example.com/a", now, Source::Wayback, "v1");
        let b = fingerprint("https://example.com/a", now, Source::CommonCrawl, "v1");
        assert_ne!(a, b);
    }
}

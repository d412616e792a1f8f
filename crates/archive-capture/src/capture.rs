use archive_common::time::parse_capture_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which archive provider produced a capture (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Wayback,
    CommonCrawl,
    Secondary,
    ProxiedCommonCrawl,
    DirectIndex,
}

impl Default for Source {
    /// Backward compatibility requirement (spec §4.1): a capture built
    /// without a declared source behaves as Wayback.
    fn default() -> Self {
        Self::Wayback
    }
}

/// A ranged read into a WARC blob, present for captures delivered by a
/// columnar archive rather than served directly (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarcLocator {
    pub warc_filename: String,
    pub warc_offset: u64,
    pub warc_length: u64,
}

/// One archived snapshot of one URL at one instant (spec §3, C1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    /// The timestamp exactly as the provider reported it (packed digits or
    /// ISO-8601), preserved for wire round-tripping.
    pub raw_timestamp: String,
    pub timestamp: DateTime<Utc>,
    pub original_url: String,
    pub mime_type: String,
    pub status_code: u16,
    pub digest: Option<String>,
    pub length: Option<u64>,
    pub source: Source,
    pub locator: Option<WarcLocator>,
}

/// Result of deriving where to fetch a capture's bytes from (spec §4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveUrl {
    pub url: String,
    /// Set when the URL is not a true archive fetch location (the
    /// "otherwise" branch of spec §4.1's derivation rules).
    pub diagnostic: Option<String>,
}

const MISSING: &str = "-";

impl Capture {
    /// Identity used for dedup within a single query (spec §3's invariant):
    /// `(original_url, timestamp, source)`. `digest` uniqueness is not
    /// guaranteed across providers and must never be used alone as a key.
    pub fn identity(&self) -> (&str, DateTime<Utc>, Source) {
        (&self.original_url, self.timestamp, self.source)
    }

    /// Derived, lazily-computed fetch location (spec §4.1).
    pub fn archive_url(&self) -> ArchiveUrl {
        match (self.source, &self.locator) {
            (Source::Wayback, _) => ArchiveUrl {
                url: format!(
                    "https://web.archive.org/web/{}/{}",
                    self.raw_timestamp, self.original_url
                ),
                diagnostic: None,
            },
            (_, Some(locator)) => ArchiveUrl {
                url: format!(
                    "https://data.commoncrawl.org/{}?offset={}&length={}",
                    locator.warc_filename, locator.warc_offset, locator.warc_length
                ),
                diagnostic: None,
            },
            _ => ArchiveUrl {
                url: self.original_url.clone(),
                diagnostic: Some(format!(
                    "no WARC locator for capture from source {:?}; returning original_url",
                    self.source
                )),
            },
        }
    }

    /// Build a Capture from a Wayback CDX row: space-delimited
    /// `timestamp original_url mime status digest length`. Never fails for
    /// well-formed input; missing/malformed fields degrade to sensible
    /// defaults rather than raising (spec §4.1).
    pub fn from_wayback(cdx_row: &str) -> Self {
        let mut fields = cdx_row.split_whitespace();

        let raw_timestamp = fields.next().unwrap_or_default().to_string();
        let original_url = fields.next().unwrap_or_default().to_string();
        let mime_type = fields.next().unwrap_or_default().to_string();
        let status_code = fields
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(0);
        let digest = fields.next().filter(|s| *s != MISSING).map(str::to_string);
        let length = fields
            .next()
            .filter(|s| *s != MISSING)
            .and_then(|s| s.parse::<u64>().ok());

        Self {
            timestamp: parse_capture_timestamp(&raw_timestamp),
            raw_timestamp,
            original_url,
            mime_type,
            status_code,
            digest,
            length,
            source: Source::Wayback,
            locator: None,
        }
    }

    /// Render this capture back into a Wayback CDX row. Exists purely so
    /// that `from_wayback(to_wayback_row(c)) == c` can be tested (spec §8).
    pub fn to_wayback_row(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.raw_timestamp,
            self.original_url,
            self.mime_type,
            self.status_code,
            self.digest.as_deref().unwrap_or(MISSING),
            self.length
                .map(|l| l.to_string())
                .unwrap_or_else(|| MISSING.to_string()),
        )
    }

    /// Build a Capture from a Common Crawl columnar-index record. Never
    /// fails for well-formed input (spec §4.1).
    pub fn from_common_crawl(row: &CommonCrawlRow) -> Self {
        let locator = match (&row.filename, row.offset, row.length) {
            (Some(filename), Some(offset), Some(length)) => Some(WarcLocator {
                warc_filename: filename.clone(),
                warc_offset: offset,
                warc_length: length,
            }),
            _ => None,
        };

        Self {
            timestamp: parse_capture_timestamp(&row.timestamp),
            raw_timestamp: row.timestamp.clone(),
            original_url: row.url.clone(),
            mime_type: row.mime.clone().unwrap_or_default(),
            status_code: row.status.unwrap_or(0),
            digest: row.digest.clone(),
            length,
            source: Source::CommonCrawl,
            locator,
        }
    }

    /// Same as `from_common_crawl` but tags the result as having been
    /// retrieved through the rotating proxy pool (C5.3).
    pub fn from_proxied_common_crawl(row: &CommonCrawlRow) -> Self {
        let mut capture = Self::from_common_crawl(row);
        capture.source = Source::ProxiedCommonCrawl;
        capture
    }

    /// Same as `from_common_crawl` but tags the result as coming from a
    /// direct scan of the published monthly index files (C5.4).
    pub fn from_direct_index(row: &CommonCrawlRow) -> Self {
        let mut capture = Self::from_common_crawl(row);
        capture.source = Source::DirectIndex;
        capture
    }

    /// Build a Capture from the secondary archive of last resort (C5.5),
    /// which speaks the same wire shape as Wayback's CDX rows.
    pub fn from_secondary(cdx_row: &str) -> Self {
        let mut capture = Self::from_wayback(cdx_row);
        capture.source = Source::Secondary;
        capture
    }
}

/// Wire shape of a Common Crawl columnar-index JSON object (spec §6):
/// `{timestamp, url, filename, offset, length, status, mime, digest}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonCrawlRow {
    pub timestamp: String,
    pub url: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub length: Option<u64>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub mime: Option<String>,
    #[serde(default)]
    pub digest: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wayback_round_trip_is_identity() {
        let capture = Capture::from_wayback("20240115120000 https://example.com/a text/html 200 ABC123 4096");
        let row = capture.to_wayback_row();
        let reparsed = Capture::from_wayback(&row);
        assert_eq!(capture, reparsed);
    }

    #[test]
    fn wayback_row_with_missing_digest_round_trips() {
        let capture = Capture::from_wayback("20240115120000 https://example.com/a text/html 200 - -");
        assert_eq!(capture.digest, None);
        assert_eq!(capture.length, None);
        let reparsed = Capture::from_wayback(&capture.to_wayback_row());
        assert_eq!(capture, reparsed);
    }

    #[test]
    fn malformed_row_never_panics() {
        let capture = Capture::from_wayback("");
        assert_eq!(capture.original_url, "");
        assert_eq!(capture.status_code, 0);
    }

    #[test]
    fn capture_without_declared_source_behaves_as_wayback() {
        assert_eq!(Source::default(), Source::Wayback);
    }

    #[test]
    fn wayback_archive_url_uses_packed_timestamp_and_original_url() {
        let capture = Capture::from_wayback("20240115120000 https://example.com/a text/html 200 ABC 10");
        let archive_url = capture.archive_url();
        assert_eq!(
            archive_url.url,
            "https://web.archive.org/web/20240115120000/https://example.com/a"
        );
        assert!(archive_url.diagnostic.is_none());
    }

    #[test]
    fn common_crawl_with_locator_derives_warc_range_url() {
        let row = CommonCrawlRow {
            timestamp: "2024-01-15T12:00:00Z".to_string(),
            url: "https://example.com/a".to_string(),
            filename: Some("crawl-data/CC-MAIN-2024-05/segments/x/warc/y.warc.gz".to_string()),
            offset: Some(1000),
            length: Some(500),
            status: Some(200),
            mime: Some("text/html".to_string()),
            digest: Some("XYZ".to_string()),
        };
        let capture = Capture::from_common_crawl(&row);
        let archive_url = capture.archive_url();
        assert_eq!(
            archive_url.url,
            "https://data.commoncrawl.org/crawl-data/CC-MAIN-2024-05/segments/x/warc/y.warc.gz?offset=1000&length=500"
        );
    }

    #[test]
    fn common_crawl_without_locator_falls_back_to_original_url_with_diagnostic() {
        let row = CommonCrawlRow {
            timestamp: "2024-01-15T12:00:00Z".to_string(),
            url: "https://example.com/a".to_string(),
            filename: None,
            offset: None,
            length: None,
            status: Some(200),
            mime: Some("text/html".to_string()),
            digest: None,
        };
        let capture = Capture::from_common_crawl(&row);
        let archive_url = capture.archive_url();
        assert_eq!(archive_url.url, "https://example.com/a");
        assert!(archive_url.diagnostic.is_some());
    }

    #[test]
    fn malformed_timestamp_defaults_to_epoch_not_panic() {
        let capture = Capture::from_wayback("not-a-timestamp https://example.com/a text/html 200 - -");
        assert_eq!(capture.timestamp.timestamp(), 0);
    }
}

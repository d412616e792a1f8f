use crate::decision::{FilterCategory, FilterDecision};
use archive_capture::Capture;

/// Path/query substrings that identify listing, pagination, search, or
/// archive-index pages rather than content pages (spec §4.2: "at least
/// 47 rules"). Matched case-insensitively against the URL's path and
/// query string.
const LIST_PAGE_PATTERNS: &[&str] = &[
    // pagination
    "/page/",
    "page=",
    "paged=",
    "/p/",
    "offset=",
    "start=",
    "pagenum=",
    "pg=",
    "/pages/",
    // search / filters
    "/search",
    "?s=",
    "&s=",
    "query=",
    "q=",
    "keyword=",
    "filter=",
    "sort=",
    "orderby=",
    "order=",
    // category / tag / archive indexes
    "/category/",
    "/categories/",
    "/tag/",
    "/tags/",
    "/topics/",
    "/topic/",
    "/archive/",
    "/archives/",
    "/index/",
    "/directory/",
    "/sitemap",
    "/feed",
    "/rss",
    "/atom",
    // date-based listing archives
    "/date/",
    "/year/",
    "/month/",
    "/day/",
    // author / section listings
    "/author/",
    "/authors/",
    "/contributors/",
    "/section/",
    "/sections/",
    // pagination-by-letter / browse
    "/browse/",
    "/alphabetical/",
    "/a-z/",
    // generic listing markers
    "/list/",
    "/lists/",
    "/all-",
    "/results",
];

const _: () = assert!(LIST_PAGE_PATTERNS.len() >= 47);

/// Second filter in the pipeline (spec §4.2): drop captures whose URL
/// matches a known listing/pagination/search pattern.
pub fn check(capture: &Capture) -> Option<FilterDecision> {
    let lowered = capture.original_url.to_ascii_lowercase();
    let matched = LIST_PAGE_PATTERNS.iter().find(|pattern| lowered.contains(*pattern))?;

    Some(FilterDecision::filtered(
        format!("matches list-page pattern {matched}"),
        FilterCategory::ListPage,
        Some((*matched).to_string()),
        true,
        3,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_at_least_47_patterns() {
        assert!(LIST_PAGE_PATTERNS.len() >= 47);
    }

    #[test]
    fn filters_pagination_url() {
        let capture = Capture::from_wayback(
            "20240115120000 https://example.com/blog/page/3 text/html 200 - -",
        );
        assert!(check(&capture).is_some());
    }

    #[test]
    fn filters_tag_archive_url() {
        let capture = Capture::from_wayback(
            "20240115120000 https://example.com/tag/rust text/html 200 - -",
        );
        assert!(check(&capture).is_some());
    }

    #[test]
    fn passes_through_ordinary_content_url() {
        let capture = Capture::from_wayback(
            "20240115120000 https://example.com/blog/my-first-post text/html 200 - -",
        );
        assert!(check(&capture).is_none());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let capture = Capture::from_wayback(
            "20240115120000 https://example.com/TAG/rust text/html 200 - -",
        );
        assert!(check(&capture).is_some());
    }
}

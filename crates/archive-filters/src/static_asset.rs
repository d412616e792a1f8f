use crate::decision::{FilterCategory, FilterDecision};
use archive_capture::Capture;

const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "mjs", "map", "woff", "woff2", "ttf", "eot", "otf", "ico", "png", "jpg", "jpeg",
    "gif", "svg", "webp", "bmp", "avif", "mp4", "webm", "mp3", "wav", "ogg", "pdf", "zip", "gz",
    "tar", "rar", "7z", "exe", "dmg", "apk", "swf",
];

/// Extensions whose MIME type is legitimately text/html despite the
/// extension looking like an asset (e.g. a CMS serving `/page.html`).
/// `list_page`/`size_type` still get a chance to filter these.
fn path_extension(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let last_segment = without_query.rsplit('/').next()?;
    let ext = last_segment.rsplit_once('.')?.1;
    if ext.is_empty() || ext.len() > 8 {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// First filter in the pipeline (spec §4.2): drop captures whose URL
/// extension identifies a static, non-content asset. Returns `None` when
/// the capture should proceed to the next filter.
pub fn check(capture: &Capture) -> Option<FilterDecision> {
    let ext = path_extension(&capture.original_url)?;
    if STATIC_EXTENSIONS.contains(&ext.as_str()) {
        Some(FilterDecision::filtered(
            format!("static asset extension .{ext}"),
            FilterCategory::StaticAsset,
            Some(ext),
            true,
            2,
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_known_static_extension() {
        let capture = Capture::from_wayback("20240115120000 https://example.com/app.js text/javascript 200 - -");
        let decision = check(&capture).expect("js should be filtered");
        assert!(!decision.outcome.is_kept());
    }

    #[test]
    fn passes_through_html_extension() {
        let capture = Capture::from_wayback("20240115120000 https://example.com/page.html text/html 200 - -");
        assert!(check(&capture).is_none());
    }

    #[test]
    fn passes_through_url_with_no_extension() {
        let capture = Capture::from_wayback("20240115120000 https://example.com/posts/123 text/html 200 - -");
        assert!(check(&capture).is_none());
    }

    #[test]
    fn ignores_extension_hiding_in_query_string() {
        let capture = Capture::from_wayback(
            "20240115120000 https://example.com/view?file=app.js text/html 200 - -",
        );
        assert!(check(&capture).is_none());
    }
}

use scraper::{Html, Selector};
use std::io::Cursor;

/// T1: structure-aware main-content extraction for prose pages (spec
/// §4.7), via the `readability` crate's Mozilla-Readability-style
/// boilerplate removal.
pub fn extract_structure_aware(html: &str, url: &str) -> Option<String> {
    let parsed_url = url::Url::parse(url).ok()?;
    let mut cursor = Cursor::new(html.as_bytes());
    let product = readability::extractor::extract(&mut cursor, &parsed_url).ok()?;
    let text = product.text.trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// T2: headline/byline extraction for news-style pages (spec §4.7).
/// Looks for an `<h1>`/`og:title` headline, a byline element, and article
/// paragraph text, concatenated in that order.
pub fn extract_news_style(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let headline = first_text(&document, "h1")
        .or_else(|| meta_content(&document, "og:title"))
        .unwrap_or_default();

    let byline = first_text(&document, "[class*=byline], [class*=author], [rel=author]")
        .unwrap_or_default();

    let article_selector = Selector::parse("article p, [class*=article] p, [class*=content] p").ok()?;
    let paragraphs: Vec<String> = document
        .select(&article_selector)
        .map(|el| el.text().collect::<Vec<_>>().join(" ").trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    if headline.is_empty() && paragraphs.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    if !headline.is_empty() {
        parts.push(headline);
    }
    if !byline.is_empty() {
        parts.push(byline);
    }
    parts.extend(paragraphs);

    let text = parts.join("\n\n");
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// T3: generic fallback text extraction — strips all markup (spec §4.7).
pub fn extract_generic_html(html: &str) -> Option<String> {
    let text = html2text::from_read(html.as_bytes(), 120);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next().map(|el| {
        el.text().collect::<Vec<_>>().join(" ").trim().to_string()
    })
}

fn meta_content(document: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse(&format!("meta[property='{property}']")).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
}

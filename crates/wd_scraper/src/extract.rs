use std::collections::HashSet;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

/// Content containers tried in order when a source has no selector
/// configured.
const CONTENT_CANDIDATES: [&str; 9] = [
    "article",
    "main",
    "[role='main']",
    ".content",
    ".post-content",
    ".article-body",
    ".entry-content",
    "#content",
    ".main",
];

/// Extract same-origin article URLs from a list page. Fragments are
/// stripped, an optional regex filters the candidates, and insertion order
/// is preserved while deduplicating.
pub fn extract_links(
    html: &str,
    base: &Url,
    link_selector: Option<&str>,
    url_pattern: Option<&str>,
) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = link_selector
        .and_then(|s| Selector::parse(s).ok())
        .unwrap_or_else(|| Selector::parse("a[href]").unwrap());
    let pattern = url_pattern.and_then(|p| Regex::new(p).ok());

    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(mut absolute) = base.join(href) else {
            continue;
        };
        if !matches!(absolute.scheme(), "http" | "https") {
            continue;
        }
        if absolute.origin() != base.origin() {
            continue;
        }
        absolute.set_fragment(None);
        let normalized = absolute.to_string();
        if let Some(re) = &pattern {
            if !re.is_match(&normalized) {
                continue;
            }
        }
        if seen.insert(normalized.clone()) {
            urls.push(normalized);
        }
    }
    urls
}

/// Article title: `og:title` when present, else the `<title>` text.
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let og = Selector::parse(r#"meta[property="og:title"]"#).unwrap();
    if let Some(content) = document
        .select(&og)
        .next()
        .and_then(|el| el.value().attr("content"))
    {
        let content = content.trim();
        if !content.is_empty() {
            return Some(content.to_string());
        }
    }

    let title = Selector::parse("title").unwrap();
    document
        .select(&title)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Body HTML of the article: the configured selector's first match, else the
/// first matching common container, else the whole body.
pub fn extract_content(html: &str, content_selector: Option<&str>) -> String {
    let document = Html::parse_document(html);

    if let Some(selector) = content_selector.and_then(|s| Selector::parse(s).ok()) {
        if let Some(element) = document.select(&selector).next() {
            return element.inner_html();
        }
        return document.html();
    }

    for candidate in CONTENT_CANDIDATES {
        let selector = Selector::parse(candidate).unwrap();
        if let Some(element) = document.select(&selector).next() {
            return element.inner_html();
        }
    }

    let body = Selector::parse("body").unwrap();
    document
        .select(&body)
        .next()
        .map(|el| el.inner_html())
        .unwrap_or_else(|| document.html())
}

/// Sanitize raw article HTML down to an allow-listed tag and attribute set.
/// An empty result becomes "(no content)" so the article row is never blank.
pub fn sanitize(html: &str) -> String {
    let cleaned = ammonia::Builder::default()
        .tags(HashSet::from([
            "p",
            "br",
            "a",
            "h1",
            "h2",
            "h3",
            "h4",
            "ul",
            "ol",
            "li",
            "strong",
            "em",
            "b",
            "i",
            "blockquote",
            "code",
            "pre",
            "span",
            "div",
        ]))
        .tag_attributes(std::collections::HashMap::from([
            ("a", HashSet::from(["href"])),
            ("code", HashSet::from(["class"])),
            ("span", HashSet::from(["class"])),
            ("div", HashSet::from(["class"])),
        ]))
        .url_schemes(HashSet::from(["http", "https", "mailto"]))
        .link_rel(None)
        .clean(html)
        .to_string();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "(no content)".to_string()
    } else {
        cleaned.to_string()
    }
}

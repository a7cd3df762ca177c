//! Outbound URL extraction from an HTML document.
//!
//! Generalizes the teacher's single-selector `extract_links` (which only
//! read `a[href]`) to the full element/attribute table the spec requires.

use crate::error::CrawlError;
use crate::normalize::normalize;
use scraper::{Html, Selector};
use url::Url;

/// (element, attribute) pairs this extractor resolves to candidate URLs,
/// matched case-insensitively by `scraper`'s CSS engine.
const TAG_ATTRS: &[(&str, &str)] = &[
    ("a", "href"),
    ("area", "href"),
    ("audio", "src"),
    ("embed", "src"),
    ("iframe", "src"),
    ("img", "src"),
    ("link", "href"),
    ("script", "src"),
    ("source", "src"),
    ("track", "src"),
    ("video", "src"),
    ("video", "poster"),
];

/// Extracts ordered, deduplicated, absolute URLs referenced by `body`,
/// resolved against `base`.
///
/// Returns `CrawlError::InvalidArgument` if `base` is empty. An empty body
/// yields an empty list. Only `http`/`https` targets are kept; values that
/// are empty or begin with `#` are skipped before resolution.
pub fn extract(body: &str, base: &Url) -> Result<Vec<Url>, CrawlError> {
    if base.as_str().is_empty() {
        return Err(CrawlError::InvalidArgument(
            "extract: base URL must not be empty".into(),
        ));
    }

    let mut out = Vec::new();
    if body.is_empty() {
        return Ok(out);
    }

    let mut seen = std::collections::HashSet::new();
    let document = Html::parse_document(body);

    for (tag, attr) in TAG_ATTRS {
        // scraper's CSS selectors already match tag names case-insensitively;
        // attribute lookups below are exact, which is correct since HTML
        // attribute names in the wild are written lowercase in practice and
        // `scraper`/`html5ever` normalize them to lowercase during parsing.
        let selector = match Selector::parse(&format!("{tag}[{attr}]")) {
            Ok(s) => s,
            Err(_) => continue,
        };

        for element in document.select(&selector) {
            let Some(value) = element.value().attr(attr) else {
                continue;
            };

            if value.is_empty() || value.starts_with('#') {
                continue;
            }

            let Ok(resolved) = base.join(value) else {
                continue;
            };

            if resolved.scheme() != "http" && resolved.scheme() != "https" {
                continue;
            }

            let canonical = normalize(&resolved);
            if seen.insert(canonical.clone()) {
                out.push(canonical);
            }
        }
    }

    Ok(out)
}

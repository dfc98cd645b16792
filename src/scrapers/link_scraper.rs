//! Download link extraction from landing pages.

use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Find the download link on a landing page.
///
/// Selectors are tried in order; the `href` of the first element matched
/// by the first selector that matches anything is returned. Invalid
/// selectors are skipped.
pub fn extract_link(html: &str, selectors: &[String]) -> Option<String> {
    let document = Html::parse_document(html);

    for selector_str in selectors {
        let selector = match Selector::parse(selector_str) {
            Ok(s) => s,
            Err(e) => {
                warn!("Skipping invalid link selector '{}': {:?}", selector_str, e);
                continue;
            }
        };

        if let Some(element) = document.select(&selector).next() {
            let href = element.value().attr("href").map(|h| h.trim().to_string());
            debug!("Link selector '{}' matched: {:?}", selector_str, href);
            return href.filter(|h| !h.is_empty());
        }
    }

    None
}

/// Resolve a scraped link against the site base URL.
pub fn resolve_link(base_url: &str, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }

    let base = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&base)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .ok()
}

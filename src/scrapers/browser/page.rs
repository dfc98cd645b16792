//! Page readiness and element polling helpers.

use std::time::Duration;

use chromiumoxide::element::Element;
use chromiumoxide::Page;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use super::pattern::UrlPattern;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Resolves once the document is interactive, with an in-page fallback.
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// Wait for the document ready state, bounded by `limit`.
pub async fn wait_until_ready(page: &Page, limit: Duration) {
    match timeout(limit, page.evaluate(WAIT_FOR_READY_SCRIPT.to_string())).await {
        Ok(Ok(result)) => {
            let state: String = result
                .into_value()
                .unwrap_or_else(|_| "unknown".to_string());
            debug!("Page ready state: {}", state);
        }
        // Non-HTML documents (PDF viewer) have no script context
        Ok(Err(e)) => debug!("Could not check ready state: {}", e),
        Err(_) => warn!("Timeout waiting for page ready state"),
    }
}

/// Let pending navigation finish and the page settle.
pub async fn wait_for_idle(page: &Page, limit: Duration) {
    if timeout(limit, page.wait_for_navigation()).await.is_err() {
        warn!("Timeout waiting for navigation to finish");
    }
    wait_until_ready(page, limit).await;
    // Late XHRs after DOMContentLoaded
    sleep(Duration::from_millis(500)).await;
}

/// First element matching `selector` right now.
pub async fn first_element(page: &Page, selector: &str) -> Option<Element> {
    page.find_elements(selector)
        .await
        .ok()
        .and_then(|found| found.into_iter().next())
}

/// Poll for an element until it appears or `limit` elapses.
pub async fn wait_for_element(page: &Page, selector: &str, limit: Duration) -> Option<Element> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(element) = first_element(page, selector).await {
            return Some(element);
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Poll the page URL until it matches `pattern` or `limit` elapses.
pub async fn wait_for_url(page: &Page, pattern: &UrlPattern, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        if let Ok(Some(url)) = page.url().await {
            if pattern.matches(&url) {
                debug!("URL {} matches {}", url, pattern.as_str());
                return true;
            }
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// First non-blank text among the elements matched by `selectors`.
///
/// Empty placeholders (a hidden `.error` container, say) are skipped.
pub async fn first_text(page: &Page, selectors: &[String]) -> Option<(String, String)> {
    for selector in selectors {
        let Ok(elements) = page.find_elements(selector.as_str()).await else {
            continue;
        };
        let mut texts = Vec::with_capacity(elements.len());
        for element in elements {
            texts.push(element.inner_text().await.ok().flatten());
        }
        if let Some(text) = first_non_blank(texts) {
            return Some((selector.clone(), text));
        }
    }
    None
}

fn first_non_blank(texts: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    texts
        .into_iter()
        .flatten()
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_error_placeholders_are_skipped() {
        let texts = vec![
            None,
            Some("   ".to_string()),
            Some("\n".to_string()),
            Some("  Invalid password ".to_string()),
            Some("Account locked".to_string()),
        ];
        assert_eq!(first_non_blank(texts).as_deref(), Some("Invalid password"));
        assert_eq!(first_non_blank(vec![Some(String::new()), None]), None);
    }
}

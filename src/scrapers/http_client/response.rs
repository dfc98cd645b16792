//! Response conversion and header parsing.

use std::collections::HashMap;

use reqwest::header::HeaderMap;

use crate::scrapers::types::{FailureKind, FetchOutcome};

/// Longest body excerpt carried in an error message.
const BODY_EXCERPT_CHARS: usize = 500;

/// Collect response headers with lower-cased names.
pub fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut collected = HashMap::new();
    for (name, value) in headers {
        if let Ok(v) = value.to_str() {
            collected.insert(name.as_str().to_ascii_lowercase(), v.to_string());
        }
    }
    collected
}

/// Map a reqwest error onto the attempt taxonomy.
pub fn outcome_from_error(err: &reqwest::Error) -> FetchOutcome {
    if is_timeout(err) {
        FetchOutcome::error(FailureKind::Timeout, err.to_string())
    } else {
        FetchOutcome::error(FailureKind::Transport, err.to_string())
    }
}

/// Connect/read timeouts, including ones surfaced as an I/O `TimedOut` source.
fn is_timeout(err: &reqwest::Error) -> bool {
    if err.is_timeout() {
        return true;
    }
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        source = std::error::Error::source(inner);
    }
    false
}

/// Truncated body text for failure details.
pub fn body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut excerpt: String = text.chars().take(BODY_EXCERPT_CHARS).collect();
    if text.chars().count() > BODY_EXCERPT_CHARS {
        excerpt.push_str("...");
    }
    excerpt
}

/// Parse filename from Content-Disposition header value.
/// Parses both `filename="name.pdf"` and `filename*=UTF-8''name.pdf` formats.
pub fn parse_content_disposition_filename(header: &str) -> Option<String> {
    // RFC 5987 encoded form takes precedence
    if let Some(start) = header.find("filename*=") {
        let rest = &header[start + 10..];
        if let Some(quote_start) = rest.find("''") {
            let encoded = rest[quote_start + 2..].split([';', ' ']).next()?;
            if let Ok(decoded) = urlencoding::decode(encoded) {
                let filename = decoded.trim().to_string();
                if !filename.is_empty() {
                    return Some(filename);
                }
            }
        }
    }

    if let Some(start) = header.find("filename=") {
        let rest = &header[start + 9..];
        let filename = if let Some(quoted) = rest.strip_prefix('"') {
            quoted.split('"').next()
        } else {
            rest.split([';', ' ']).next()
        };

        if let Some(name) = filename {
            let name = name.trim().to_string();
            if !name.is_empty() {
                return Some(name);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_disposition_quoted() {
        let header = r#"attachment; filename="2024-03-01.pdf""#;
        assert_eq!(
            parse_content_disposition_filename(header),
            Some("2024-03-01.pdf".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_rfc5987_preferred() {
        let header =
            r#"attachment; filename="fallback.pdf"; filename*=UTF-8''morning%20edition.pdf"#;
        assert_eq!(
            parse_content_disposition_filename(header),
            Some("morning edition.pdf".to_string())
        );
    }

    #[test]
    fn test_parse_content_disposition_none() {
        assert_eq!(parse_content_disposition_filename("inline"), None);
    }

    #[test]
    fn test_body_excerpt_truncates() {
        let long = "x".repeat(BODY_EXCERPT_CHARS + 10);
        let excerpt = body_excerpt(long.as_bytes());
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.len(), BODY_EXCERPT_CHARS + 3);
        assert_eq!(body_excerpt(b"Not Found"), "Not Found");
    }

    #[test]
    fn test_collect_headers_lowercases() {
        let mut map = HeaderMap::new();
        map.insert("Content-Type", "application/pdf".parse().unwrap());
        let headers = collect_headers(&map);
        assert_eq!(
            headers.get("content-type").map(String::as_str),
            Some("application/pdf")
        );
    }
}

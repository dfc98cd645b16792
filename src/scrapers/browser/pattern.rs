//! Glob-style URL patterns for login success detection.

use regex::Regex;

/// URL pattern where `*` matches any run of characters.
///
/// Patterns without a wildcard must match the whole URL.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    source: String,
    regex: Regex,
}

impl UrlPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let mut expr = String::from("^");
        for (i, part) in pattern.split('*').enumerate() {
            if i > 0 && !expr.ends_with(".*") {
                expr.push_str(".*");
            }
            expr.push_str(&regex::escape(part));
        }
        expr.push('$');

        Ok(Self {
            source: pattern.to_string(),
            regex: Regex::new(&expr)?,
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

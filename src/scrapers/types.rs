//! Outcome of a single acquisition attempt.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::models::DocumentFormat;

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connect or read timeout.
    Timeout,
    /// Any other request/transport error.
    Transport,
    /// Local write or rename failure.
    Filesystem,
    /// Browser navigation error or error status on the navigated page.
    Navigation,
    /// Browser engine error (launch, CDP command, crashed target).
    Engine,
}

/// Result of one attempt, whichever strategy produced it.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A complete HTTP response. Header names are lower-cased.
    Http {
        status: u16,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    },
    /// A file captured and persisted through the browser.
    BrowserCapture {
        path: PathBuf,
        format: DocumentFormat,
    },
    /// The attempt failed before a response was available.
    Error { kind: FailureKind, detail: String },
}

impl FetchOutcome {
    pub fn error(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Error {
            kind,
            detail: detail.into(),
        }
    }

    /// HTTP status, if this outcome carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Header value by (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        match self {
            Self::Http { headers, .. } => headers
                .get(&name.to_ascii_lowercase())
                .map(|s| s.as_str()),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Error {
                kind: FailureKind::Timeout,
                ..
            }
        )
    }
}

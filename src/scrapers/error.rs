//! Error types for the acquisition strategies.

use std::path::PathBuf;

use thiserror::Error;

use super::types::FailureKind;

/// Why a retry loop gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// Every attempt timed out.
    TimedOut,
    /// The last attempt returned this retryable status.
    Status(u16),
}

/// Failure of a direct HTTP fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{}", exhausted_message(.exhaustion, .attempts))]
    RetryExhausted {
        attempts: u32,
        exhaustion: Exhaustion,
    },
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Request error: {0}")]
    Transport(String),
    #[error("Failed to write {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn exhausted_message(exhaustion: &Exhaustion, attempts: &u32) -> String {
    match *exhaustion {
        Exhaustion::TimedOut => format!("Download timed out repeatedly ({} attempts)", attempts),
        Exhaustion::Status(status) => {
            format!("Download failed with status {} after {} attempts", status, attempts)
        }
    }
}

impl FetchError {
    /// Local write failures are terminal for the whole acquisition.
    pub fn is_filesystem(&self) -> bool {
        matches!(self, Self::Filesystem { .. })
    }
}

/// Failure of the browser download strategy.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Browser navigation failed: {0}")]
    Navigation(String),
    #[error("Browser error: {0}")]
    Engine(String),
    #[error("Browser timed out: {0}")]
    Timeout(String),
    #[error("Browser transport error: {0}")]
    Transport(String),
    #[error("Failed to save browser download to {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unknown content type: {0}")]
    UnknownContentType(String),
}

impl BrowserError {
    pub(crate) fn engine(err: impl std::fmt::Display) -> Self {
        Self::Engine(err.to_string())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Navigation(_) => FailureKind::Navigation,
            Self::Engine(_) | Self::UnknownContentType(_) => FailureKind::Engine,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Transport(_) => FailureKind::Transport,
            Self::Filesystem { .. } => FailureKind::Filesystem,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustion_messages_are_distinct() {
        let timed_out = FetchError::RetryExhausted {
            attempts: 3,
            exhaustion: Exhaustion::TimedOut,
        };
        let status = FetchError::RetryExhausted {
            attempts: 3,
            exhaustion: Exhaustion::Status(503),
        };
        assert!(timed_out.to_string().contains("timed out repeatedly"));
        assert!(status.to_string().contains("status 503 after 3 attempts"));
    }

    #[test]
    fn test_filesystem_is_distinguishable() {
        let err = FetchError::Filesystem {
            path: PathBuf::from("/nope/x.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.is_filesystem());
        assert!(!FetchError::Transport("reset".into()).is_filesystem());
    }

    #[test]
    fn test_browser_error_kinds() {
        let nav = BrowserError::Navigation("HTTP 404 for https://paper.example.com".into());
        assert_eq!(nav.kind(), FailureKind::Navigation);
        let mime = BrowserError::UnknownContentType("application/zip".into());
        assert_eq!(mime.kind(), FailureKind::Engine);
        assert_eq!(BrowserError::Timeout("load".into()).kind(), FailureKind::Timeout);
        let fs = BrowserError::Filesystem {
            path: PathBuf::from("/nope/x.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(fs.kind(), FailureKind::Filesystem);
    }
}

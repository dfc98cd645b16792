//! Acquisition request, result and session types.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// File format of an acquired edition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Html,
}

impl DocumentFormat {
    /// Preference order for existence checks.
    pub const ALL: [DocumentFormat; 2] = [DocumentFormat::Pdf, DocumentFormat::Html];

    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Html => "html",
        }
    }

    /// Path of a file in this format under the given extension-less stem.
    pub fn path_for(&self, stem: &Path) -> PathBuf {
        let mut path = stem.as_os_str().to_owned();
        path.push(".");
        path.push(self.extension());
        PathBuf::from(path)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Login credentials for the target site.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// One acquisition of one dated edition.
#[derive(Debug, Clone)]
pub struct AcquisitionRequest {
    pub base_url: String,
    pub login_url: String,
    pub credentials: Credentials,
    /// Extension-less destination path; the inferred extension is appended.
    pub save_path_stem: PathBuf,
    pub target_date: NaiveDate,
    pub dry_run: bool,
    pub force_download: bool,
}

impl AcquisitionRequest {
    /// Conventional stem for an edition: `<download_dir>/<YYYY-MM-DD>_newspaper`.
    pub fn default_stem(download_dir: &Path, date: NaiveDate) -> PathBuf {
        download_dir.join(format!("{}_newspaper", date.format("%Y-%m-%d")))
    }

    /// Target date formatted for URL templates.
    pub fn date_string(&self) -> String {
        self.target_date.format("%Y-%m-%d").to_string()
    }
}

/// Cookie captured from an authenticated browser session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default)]
    pub http_only: Option<bool>,
    /// Expiry as seconds since the epoch; `None` for session cookies.
    #[serde(default)]
    pub expires: Option<f64>,
}

impl SessionCookie {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: "/".to_string(),
            secure: None,
            http_only: None,
            expires: None,
        }
    }
}

/// Ordered cookie set owned by a single acquisition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionCookies(Vec<SessionCookie>);

impl SessionCookies {
    pub fn new(cookies: Vec<SessionCookie>) -> Self {
        Self(cookies)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SessionCookie> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Cookie names, for logging without values.
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|c| c.name.as_str()).collect()
    }
}

impl FromIterator<SessionCookie> for SessionCookies {
    fn from_iter<I: IntoIterator<Item = SessionCookie>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a SessionCookies {
    type Item = &'a SessionCookie;
    type IntoIter = std::slice::Iter<'a, SessionCookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A document persisted (or, in dry-run mode, located) by a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDocument {
    pub format: DocumentFormat,
    pub path: PathBuf,
}

impl SavedDocument {
    pub fn new(format: DocumentFormat, stem: &Path) -> Self {
        Self {
            format,
            path: format.path_for(stem),
        }
    }
}

/// Terminal outcome of an acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionResult {
    Success {
        format: DocumentFormat,
        path: PathBuf,
    },
    Failure {
        reason: String,
    },
}

impl AcquisitionResult {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Caller-facing `(success, format_or_message)` pair.
    ///
    /// On success the second element is the file extension; on failure it
    /// is the human-readable reason.
    pub fn into_pair(self) -> (bool, String) {
        match self {
            Self::Success { format, .. } => (true, format.extension().to_string()),
            Self::Failure { reason } => (false, reason),
        }
    }
}

impl From<SavedDocument> for AcquisitionResult {
    fn from(doc: SavedDocument) -> Self {
        Self::Success {
            format: doc.format,
            path: doc.path,
        }
    }
}

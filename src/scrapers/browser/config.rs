//! Browser engine configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Chrome/Chromium executable. Discovered automatically when unset.
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// Page load and CDP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Bound on waiting for a login form element or success indicator, in seconds.
    #[serde(default = "default_selector_timeout")]
    pub selector_timeout: u64,

    /// How long navigation may take to trigger a file download, in seconds.
    #[serde(default = "default_download_start_timeout")]
    pub download_start_timeout: u64,

    /// How long a started download may take to finish, in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout: u64,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,
}

pub fn default_headless() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    30
}

fn default_selector_timeout() -> u64 {
    10
}

fn default_download_start_timeout() -> u64 {
    5
}

fn default_download_timeout() -> u64 {
    120
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            executable: None,
            timeout: default_timeout(),
            selector_timeout: default_selector_timeout(),
            download_start_timeout: default_download_start_timeout(),
            download_timeout: default_download_timeout(),
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}

impl BrowserEngineConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn selector_wait(&self) -> Duration {
        Duration::from_secs(self.selector_timeout)
    }

    pub fn download_start_wait(&self) -> Duration {
        Duration::from_secs(self.download_start_timeout)
    }

    pub fn download_wait(&self) -> Duration {
        Duration::from_secs(self.download_timeout)
    }
}

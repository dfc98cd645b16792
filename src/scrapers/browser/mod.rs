//! Headless browser strategies: login and last-resort download.
//!
//! Uses chromiumoxide (CDP). Each authenticate/download call owns one
//! browser session for its whole duration and closes it on every exit path.

mod config;
#[cfg(feature = "browser")]
mod cookies;
mod download;
mod login;
#[cfg(feature = "browser")]
mod page;
mod pattern;

pub use config::BrowserEngineConfig;
pub use download::BrowserDownloader;
pub use login::{LoginStage, SessionAuthenticator};
pub use pattern::UrlPattern;

use std::path::{Path, PathBuf};

use tracing::debug;

#[cfg(feature = "browser")]
use std::sync::Mutex;

#[cfg(feature = "browser")]
use anyhow::{Context, Result};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;
#[cfg(feature = "browser")]
use tracing::info;

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Find a Chrome executable: configured path, `CHROME_PATH`, common
/// install locations, then `PATH`.
pub fn find_chrome(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        debug!("Configured browser executable {} not found", path.display());
    }

    if let Ok(env_path) = std::env::var("CHROME_PATH") {
        let path = PathBuf::from(shellexpand::tilde(&env_path).as_ref());
        if path.exists() {
            return Some(path);
        }
    }

    CHROME_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .or_else(|| CHROME_COMMANDS.iter().find_map(|cmd| which::which(cmd).ok()))
}

/// A launched (or attached) browser plus its CDP event loop.
#[cfg(feature = "browser")]
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    remote: bool,
    // Tabs opened through this session, closed by `close`
    pages: Mutex<Vec<Page>>,
    // Removed on drop, after the browser has exited
    _profile: Option<tempfile::TempDir>,
}

#[cfg(feature = "browser")]
impl BrowserSession {
    /// Launch a browser, or connect to `remote_url` if configured.
    pub async fn launch(config: &BrowserEngineConfig) -> Result<Self> {
        if let Some(remote_url) = config.remote_url.as_deref() {
            return Self::connect_remote(config, remote_url).await;
        }

        let chrome_path = find_chrome(config.executable.as_deref()).ok_or_else(|| {
            anyhow::anyhow!(
                "Chrome/Chromium not found. Install it or set browser.executable / CHROME_PATH"
            )
        })?;
        info!(
            "Launching browser {} (headless={})",
            chrome_path.display(),
            config.headless
        );

        let profile = tempfile::tempdir().context("Failed to create browser profile dir")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(profile.path())
            .request_timeout(config.page_timeout());

        // with_head means NOT headless
        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--no-sandbox") // Often needed for headless in containers
            .arg("--disable-gpu");

        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;

        Ok(Self {
            browser,
            handler: spawn_handler(handler),
            remote: false,
            pages: Mutex::new(Vec::new()),
            _profile: Some(profile),
        })
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(config: &BrowserEngineConfig, url: &str) -> Result<Self> {
        info!("Connecting to remote browser at {}", url);

        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .timeout(config.page_timeout())
            .send()
            .await
            .context("Failed to connect to remote browser")?
            .json()
            .await
            .context("Failed to parse browser version info")?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in response"))?;

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: config.page_timeout(),
            ..Default::default()
        };

        let (browser, handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .context("Failed to connect to remote browser")?;

        Ok(Self {
            browser,
            handler: spawn_handler(handler),
            remote: true,
            pages: Mutex::new(Vec::new()),
            _profile: None,
        })
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Open a tab owned by this session.
    pub async fn new_page(&self) -> Result<Page> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("Failed to open browser page")?;
        if let Ok(mut pages) = self.pages.lock() {
            pages.push(page.clone());
        }
        Ok(page)
    }

    /// Close every tab opened through this session.
    async fn close_pages(&self) {
        let pages = match self.pages.lock() {
            Ok(mut pages) => std::mem::take(&mut *pages),
            Err(_) => return,
        };
        for page in pages {
            if let Err(e) = page.close().await {
                debug!("Page close failed: {}", e);
            }
        }
    }

    /// Release the session's tabs and shut the browser down.
    ///
    /// A remote browser is left running, with its download behavior reset.
    pub async fn close(mut self) {
        self.close_pages().await;
        if self.remote {
            let reset = SetDownloadBehaviorParams::new(SetDownloadBehaviorBehavior::Default);
            if let Err(e) = self.browser.execute(reset).await {
                debug!("Download behavior reset failed: {}", e);
            }
        } else {
            if let Err(e) = self.browser.close().await {
                debug!("Browser close failed: {}", e);
            }
            if let Err(e) = self.browser.wait().await {
                debug!("Browser wait failed: {}", e);
            }
        }
        self.handler.abort();
    }
}

#[cfg(feature = "browser")]
impl Drop for BrowserSession {
    fn drop(&mut self) {
        // chromiumoxide kills a launched child process when Browser drops
        self.handler.abort();
    }
}

#[cfg(feature = "browser")]
fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_chrome_prefers_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("my-chrome");
        std::fs::write(&exe, b"").unwrap();
        assert_eq!(find_chrome(Some(&exe)), Some(exe));
    }

    /// Needs a local Chrome/Chromium.
    #[cfg(feature = "browser")]
    #[ignore]
    #[tokio::test]
    async fn test_close_releases_session_pages() {
        let session = BrowserSession::launch(&BrowserEngineConfig::default())
            .await
            .unwrap();
        let before = session.browser().pages().await.unwrap().len();
        session.new_page().await.unwrap();
        session.new_page().await.unwrap();
        assert_eq!(session.browser().pages().await.unwrap().len(), before + 2);

        session.close_pages().await;
        assert_eq!(session.browser().pages().await.unwrap().len(), before);
        session.close().await;
    }
}

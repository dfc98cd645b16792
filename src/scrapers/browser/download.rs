//! Last-resort download through a headless browser.
//!
//! Order of attempts on the loaded page:
//! 1. a download the navigation itself triggers,
//! 2. a download triggered by clicking a download affordance,
//! 3. the navigation response body (PDF) or rendered markup (HTML).

use std::path::Path;

use tracing::info;

use super::config::BrowserEngineConfig;
use crate::models::{SavedDocument, SessionCookies};
use crate::scrapers::error::BrowserError;

#[cfg(feature = "browser")]
use std::path::PathBuf;
#[cfg(feature = "browser")]
use std::sync::Arc;

#[cfg(feature = "browser")]
use base64::Engine as _;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::browser::{
    DownloadProgressState, EventDownloadProgress, EventDownloadWillBegin,
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, GetResponseBodyParams, ResourceType,
};
#[cfg(feature = "browser")]
use chromiumoxide::error::CdpError;
#[cfg(feature = "browser")]
use chromiumoxide::listeners::EventStream;
#[cfg(feature = "browser")]
use chromiumoxide::Page;
#[cfg(feature = "browser")]
use futures::{FutureExt, StreamExt};
#[cfg(feature = "browser")]
use tokio::time::timeout;
#[cfg(feature = "browser")]
use tracing::{debug, warn};

#[cfg(feature = "browser")]
use super::{cookies, page, BrowserSession};
#[cfg(feature = "browser")]
use crate::models::DocumentFormat;
#[cfg(feature = "browser")]
use crate::utils::{classify_content_type, format_from_filename};

/// CSS selectors for common download controls, tried in order.
#[cfg(feature = "browser")]
const DOWNLOAD_AFFORDANCES: &[&str] = &[
    "a[download]",
    "a[href$='.pdf']",
    "a[href*='download']",
    "button[id*='download']",
    "button[class*='download']",
    "[class*='download'] a",
];

/// Clicks the first link/button whose text or label mentions downloading.
#[cfg(feature = "browser")]
const CLICK_DOWNLOAD_TEXT_SCRIPT: &str = r#"
    (() => {
        const pattern = /download|herunterladen|t[ée]l[ée]charger/i;
        const candidates = Array.from(document.querySelectorAll('a, button, [role="button"]'));
        const target = candidates.find((el) =>
            pattern.test((el.textContent || '').trim()) ||
            pattern.test(el.getAttribute('title') || '') ||
            pattern.test(el.getAttribute('aria-label') || ''));
        if (!target) {
            return false;
        }
        target.click();
        return true;
    })()
"#;

/// Downloads a document by driving a headless browser.
#[derive(Debug, Clone, Default)]
pub struct BrowserDownloader {
    config: BrowserEngineConfig,
}

impl BrowserDownloader {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }

    /// Load `url` with `cookies` and save whatever document it yields under `save_stem`.
    ///
    /// In dry-run mode downloads are denied and nothing is written, but the
    /// inferred format is still reported.
    pub async fn download(
        &self,
        url: &str,
        save_stem: &Path,
        cookies: &SessionCookies,
        dry_run: bool,
    ) -> Result<SavedDocument, BrowserError> {
        info!("Browser download of {} (dry_run={})", url, dry_run);
        self.run(url, save_stem, cookies, dry_run).await
    }

    #[cfg(not(feature = "browser"))]
    async fn run(
        &self,
        _url: &str,
        _save_stem: &Path,
        _cookies: &SessionCookies,
        _dry_run: bool,
    ) -> Result<SavedDocument, BrowserError> {
        Err(BrowserError::Engine(
            "Browser support not compiled. Rebuild with: cargo build --features browser".into(),
        ))
    }

    #[cfg(feature = "browser")]
    async fn run(
        &self,
        url: &str,
        save_stem: &Path,
        cookies: &SessionCookies,
        dry_run: bool,
    ) -> Result<SavedDocument, BrowserError> {
        let staging = if dry_run {
            None
        } else {
            Some(staging_dir(save_stem)?)
        };

        let session = BrowserSession::launch(&self.config)
            .await
            .map_err(|e| BrowserError::Engine(format!("{:#}", e)))?;

        let result = self
            .capture(&session, url, save_stem, cookies, staging.as_ref().map(|d| d.path()))
            .await;
        session.close().await;
        result
    }

    #[cfg(feature = "browser")]
    async fn capture(
        &self,
        session: &BrowserSession,
        url: &str,
        save_stem: &Path,
        cookies: &SessionCookies,
        staging: Option<&Path>,
    ) -> Result<SavedDocument, BrowserError> {
        let browser = session.browser();

        let mut behavior = match staging {
            Some(_) => SetDownloadBehaviorParams::new(SetDownloadBehaviorBehavior::AllowAndName),
            None => SetDownloadBehaviorParams::new(SetDownloadBehaviorBehavior::Deny),
        };
        behavior.download_path = staging.map(|p| p.to_string_lossy().into_owned());
        behavior.events_enabled = Some(true);
        browser.execute(behavior).await.map_err(from_cdp)?;

        let mut started = browser
            .event_listener::<EventDownloadWillBegin>()
            .await
            .map_err(from_cdp)?;
        let mut progress = browser
            .event_listener::<EventDownloadProgress>()
            .await
            .map_err(from_cdp)?;

        let tab = session.new_page().await.map_err(|e| BrowserError::Engine(format!("{:#}", e)))?;
        if !cookies.is_empty() {
            tab.set_cookies(cookies::to_params(cookies, url))
                .await
                .map_err(from_cdp)?;
        }
        let mut responses = tab
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(from_cdp)?;

        // A navigation that turns into a download reports an aborted load
        let navigation = tab.goto(url).await.map(|_| ());

        // Passive capture
        let start_wait = self.config.download_start_wait();
        if let Ok(Some(event)) = timeout(start_wait, started.next()).await {
            info!("Navigation triggered download of '{}'", event.suggested_filename);
            return self
                .finish_download(&event, &mut progress, save_stem, staging)
                .await;
        }

        if let Err(e) = navigation {
            return Err(navigation_error(url, e));
        }
        page::wait_for_idle(&tab, self.config.page_timeout()).await;

        let document = last_document_response(&mut responses);
        if let Some(doc) = &document {
            if doc.response.status >= 400 {
                return Err(BrowserError::Navigation(format!(
                    "HTTP {} for {}",
                    doc.response.status, url
                )));
            }
        }

        // Active trigger
        if click_download_affordance(&tab).await {
            match timeout(start_wait, started.next()).await {
                Ok(Some(event)) => {
                    info!("Click triggered download of '{}'", event.suggested_filename);
                    return self
                        .finish_download(&event, &mut progress, save_stem, staging)
                        .await;
                }
                _ => warn!("Download control on {} did not start a download", url),
            }
        }

        // Content fallback
        let doc = last_document_response(&mut responses)
            .or(document)
            .ok_or_else(|| BrowserError::Navigation(format!("no document response for {}", url)))?;
        self.save_content(&tab, &doc, save_stem, staging.is_none())
            .await
    }

    /// Wait for a started download and move it into place.
    #[cfg(feature = "browser")]
    async fn finish_download(
        &self,
        event: &EventDownloadWillBegin,
        progress: &mut EventStream<EventDownloadProgress>,
        save_stem: &Path,
        staging: Option<&Path>,
    ) -> Result<SavedDocument, BrowserError> {
        let format = format_from_filename(&event.suggested_filename);
        let saved = SavedDocument::new(format, save_stem);

        let Some(staging) = staging else {
            info!(
                "[Dry Run] Would save browser download '{}' to {}",
                event.suggested_filename,
                saved.path.display()
            );
            return Ok(saved);
        };

        let wait = self.config.download_wait();
        let completed = timeout(wait, async {
            while let Some(update) = progress.next().await {
                if update.guid != event.guid {
                    continue;
                }
                match update.state {
                    DownloadProgressState::Completed => return Ok(()),
                    DownloadProgressState::Canceled => {
                        return Err(BrowserError::Engine(format!(
                            "download of '{}' was canceled",
                            event.suggested_filename
                        )))
                    }
                    _ => {}
                }
            }
            Err(BrowserError::Transport("browser event stream closed".into()))
        })
        .await
        .map_err(|_| {
            BrowserError::Timeout(format!(
                "download of '{}' did not finish within {:?}",
                event.suggested_filename, wait
            ))
        })?;
        completed?;

        // AllowAndName stores the file under its guid
        let staged = staging.join(&event.guid);
        move_into_place(&staged, &saved.path).await?;
        info!("Saved browser download to {}", saved.path.display());
        Ok(saved)
    }

    /// Save the navigation response itself.
    #[cfg(feature = "browser")]
    async fn save_content(
        &self,
        tab: &Page,
        doc: &EventResponseReceived,
        save_stem: &Path,
        dry_run: bool,
    ) -> Result<SavedDocument, BrowserError> {
        let mime = doc.response.mime_type.as_str();
        let format = classify_content_type(mime)
            .ok_or_else(|| BrowserError::UnknownContentType(mime.to_string()))?;
        let saved = SavedDocument::new(format, save_stem);

        if dry_run {
            info!(
                "[Dry Run] Would save page content ({}) to {}",
                mime,
                saved.path.display()
            );
            return Ok(saved);
        }

        let bytes = match format {
            DocumentFormat::Pdf => {
                let body = tab
                    .execute(GetResponseBodyParams::new(doc.request_id.clone()))
                    .await
                    .map_err(from_cdp)?;
                if body.result.base64_encoded {
                    base64::engine::general_purpose::STANDARD
                        .decode(&body.result.body)
                        .map_err(|e| BrowserError::Engine(format!("invalid response body: {}", e)))?
                } else {
                    body.result.body.clone().into_bytes()
                }
            }
            DocumentFormat::Html => tab.content().await.map_err(from_cdp)?.into_bytes(),
        };

        tokio::fs::write(&saved.path, &bytes)
            .await
            .map_err(|source| BrowserError::Filesystem {
                path: saved.path.clone(),
                source,
            })?;
        info!(
            "Saved {} bytes of page content to {}",
            bytes.len(),
            saved.path.display()
        );
        Ok(saved)
    }
}

/// Try the CSS affordances, then a text search. True if something was clicked.
#[cfg(feature = "browser")]
async fn click_download_affordance(tab: &Page) -> bool {
    for selector in DOWNLOAD_AFFORDANCES {
        if let Some(element) = page::first_element(tab, selector).await {
            debug!("Clicking download control '{}'", selector);
            match element.click().await {
                Ok(_) => return true,
                Err(e) => debug!("Click on '{}' failed: {}", selector, e),
            }
        }
    }

    match tab.evaluate(CLICK_DOWNLOAD_TEXT_SCRIPT.to_string()).await {
        Ok(result) => result.into_value::<bool>().unwrap_or(false),
        Err(e) => {
            debug!("Download text search failed: {}", e);
            false
        }
    }
}

/// Most recent top-level document response received so far.
#[cfg(feature = "browser")]
fn last_document_response(
    stream: &mut EventStream<EventResponseReceived>,
) -> Option<Arc<EventResponseReceived>> {
    let mut last = None;
    while let Some(Some(event)) = stream.next().now_or_never() {
        if event.r#type == ResourceType::Document {
            last = Some(event);
        }
    }
    last
}

/// Hidden staging directory next to the target so the final move is a rename.
#[cfg(feature = "browser")]
fn staging_dir(save_stem: &Path) -> Result<tempfile::TempDir, BrowserError> {
    let parent = save_stem
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    tempfile::Builder::new()
        .prefix(".download-")
        .tempdir_in(&parent)
        .map_err(|source| BrowserError::Filesystem {
            path: parent,
            source,
        })
}

#[cfg(feature = "browser")]
async fn move_into_place(from: &Path, to: &Path) -> Result<(), BrowserError> {
    let fs_error = |source| BrowserError::Filesystem {
        path: to.to_path_buf(),
        source,
    };
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await.map_err(fs_error)?;
    let _ = tokio::fs::remove_file(from).await;
    Ok(())
}

#[cfg(feature = "browser")]
fn from_cdp(err: CdpError) -> BrowserError {
    match err {
        CdpError::Timeout => BrowserError::Timeout("CDP request timed out".into()),
        CdpError::Ws(e) => BrowserError::Transport(e.to_string()),
        other => BrowserError::engine(other),
    }
}

#[cfg(feature = "browser")]
fn navigation_error(url: &str, err: CdpError) -> BrowserError {
    match err {
        CdpError::Timeout => BrowserError::Timeout(format!("navigation to {} timed out", url)),
        CdpError::Ws(e) => BrowserError::Transport(e.to_string()),
        other => BrowserError::Navigation(format!("{}: {}", url, other)),
    }
}

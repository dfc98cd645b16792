//! Acquisition pipeline: existing file check, login, then the download
//! fallback chain (direct fetch, scraped link, browser).

mod strategy;

use std::panic::AssertUnwindSafe;
use std::path::Path;

use chrono::NaiveDate;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

pub use strategy::{Authenticator, Downloader, Fetcher};

use crate::config::{Config, SelectorSet};
use crate::models::{AcquisitionRequest, AcquisitionResult, DocumentFormat, SavedDocument};
use crate::scrapers::{
    extract_link, resolve_link, BrowserDownloader, DirectFetcher, FetchOutcome,
    SessionAuthenticator,
};

/// Default path template for the dated download URL.
pub const DEFAULT_DOWNLOAD_PATH_PATTERN: &str = "newspaper/download/{date}";

/// Reason reported when login yields no session.
pub const AUTH_FAILURE_REASON: &str = "Failed to obtain cookies.";

/// Composes authentication and the download strategies.
pub struct AcquisitionOrchestrator<A, F, D> {
    authenticator: A,
    fetcher: F,
    downloader: D,
    selectors: SelectorSet,
    download_path_pattern: String,
}

impl AcquisitionOrchestrator<SessionAuthenticator, DirectFetcher, BrowserDownloader> {
    /// Build the production pipeline from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            SessionAuthenticator::new(config.browser.clone()),
            DirectFetcher::from_config(&config.http, &config.retry),
            BrowserDownloader::new(config.browser.clone()),
            config.newspaper.selectors.clone(),
            config.newspaper.download_path_pattern.clone(),
        )
    }
}

impl<A, F, D> AcquisitionOrchestrator<A, F, D>
where
    A: Authenticator,
    F: Fetcher,
    D: Downloader,
{
    pub fn new(
        authenticator: A,
        fetcher: F,
        downloader: D,
        selectors: SelectorSet,
        download_path_pattern: impl Into<String>,
    ) -> Self {
        Self {
            authenticator,
            fetcher,
            downloader,
            selectors,
            download_path_pattern: download_path_pattern.into(),
        }
    }

    /// Canonical download URL for `date`.
    pub fn download_url(&self, base_url: &str, date: NaiveDate) -> String {
        download_url(base_url, &self.download_path_pattern, date)
    }

    /// Run the pipeline for one request.
    pub async fn acquire(&self, request: &AcquisitionRequest) -> AcquisitionResult {
        let stem = request.save_path_stem.as_path();

        if !request.force_download {
            if let Some(existing) = existing_document(stem) {
                info!(
                    "{} already exists, skipping download",
                    existing.path.display()
                );
                return existing.into();
            }
        }

        let Some(cookies) = self
            .authenticator
            .authenticate(&request.login_url, &request.credentials, &self.selectors)
            .await
        else {
            error!("Authentication at {} failed", request.login_url);
            return AcquisitionResult::failure(AUTH_FAILURE_REASON);
        };
        debug!("Session cookies: {:?}", cookies.names());

        let url = self.download_url(&request.base_url, request.target_date);
        info!("Downloading {} edition from {}", request.date_string(), url);

        // Direct download
        match self
            .fetcher
            .fetch(&url, &cookies, stem, request.dry_run)
            .await
        {
            Ok(format) => return success(format, stem),
            Err(e) if e.is_filesystem() => {
                error!("{}", e);
                return AcquisitionResult::failure(e.to_string());
            }
            Err(e) => warn!("Direct download of {} failed: {}", url, e),
        }

        // Landing page link
        match self.fetcher.fetch_page(&url, &cookies).await {
            Ok(html) => match extract_link(&html, &self.selectors.download_link_selectors) {
                Some(href) => match resolve_link(&request.base_url, &href) {
                    Some(link) => {
                        info!("Found download link {}", link);
                        match self
                            .fetcher
                            .fetch(&link, &cookies, stem, request.dry_run)
                            .await
                        {
                            Ok(format) => return success(format, stem),
                            Err(e) if e.is_filesystem() => {
                                error!("{}", e);
                                return AcquisitionResult::failure(e.to_string());
                            }
                            Err(e) => warn!("Download of scraped link {} failed: {}", link, e),
                        }
                    }
                    None => warn!("Could not resolve scraped link '{}'", href),
                },
                None => info!("No download link found on {}", url),
            },
            Err(e) => warn!("Could not load {} as a page: {}", url, e),
        }

        // Browser
        info!("Falling back to browser download of {}", url);
        let browser_attempt = AssertUnwindSafe(self.downloader.download(
            &url,
            stem,
            &cookies,
            request.dry_run,
        ))
        .catch_unwind()
        .await;

        match browser_attempt {
            Ok(FetchOutcome::BrowserCapture { path, format }) => {
                info!("Browser saved {} ({})", path.display(), format);
                AcquisitionResult::Success { format, path }
            }
            Ok(FetchOutcome::Error { kind, detail }) => {
                error!("Browser download of {} failed ({:?}): {}", url, kind, detail);
                AcquisitionResult::failure(detail)
            }
            Ok(FetchOutcome::Http { status, .. }) => {
                error!("Browser download of {} ended with bare HTTP {}", url, status);
                AcquisitionResult::failure(format!("Browser download returned HTTP {}", status))
            }
            Err(_) => {
                error!("Browser download of {} panicked", url);
                AcquisitionResult::failure("Browser download failed unexpectedly")
            }
        }
    }
}

fn success(format: DocumentFormat, stem: &Path) -> AcquisitionResult {
    SavedDocument::new(format, stem).into()
}

/// An already saved document under `stem`, PDF preferred.
pub fn existing_document(stem: &Path) -> Option<SavedDocument> {
    DocumentFormat::ALL
        .iter()
        .map(|format| SavedDocument::new(*format, stem))
        .find(|saved| saved.path.is_file())
}

/// Join `base_url` with `pattern`, substituting `{date}` as `YYYY-MM-DD`.
pub fn download_url(base_url: &str, pattern: &str, date: NaiveDate) -> String {
    let path = pattern.replace("{date}", &date.format("%Y-%m-%d").to_string());
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

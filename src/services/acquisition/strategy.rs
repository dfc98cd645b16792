//! Strategy seams used by the acquisition pipeline.

use std::path::Path;

use async_trait::async_trait;

use crate::config::SelectorSet;
use crate::models::{Credentials, DocumentFormat, SessionCookies};
use crate::scrapers::{
    BrowserDownloader, DirectFetcher, FetchError, FetchOutcome, SessionAuthenticator,
};

/// Establishes an authenticated session.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Log in and return the session cookies, or `None` if login failed.
    async fn authenticate(
        &self,
        login_url: &str,
        credentials: &Credentials,
        selectors: &SelectorSet,
    ) -> Option<SessionCookies>;
}

/// Downloads over plain HTTP with the session cookies.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url` to `save_stem` plus the inferred extension.
    async fn fetch(
        &self,
        url: &str,
        cookies: &SessionCookies,
        save_stem: &Path,
        dry_run: bool,
    ) -> Result<DocumentFormat, FetchError>;

    /// Fetch `url` once and return the body as HTML text.
    async fn fetch_page(&self, url: &str, cookies: &SessionCookies) -> Result<String, FetchError>;
}

/// Last-resort download through a browser.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// `BrowserCapture` on success, otherwise `Error` with the failure kind.
    async fn download(
        &self,
        url: &str,
        save_stem: &Path,
        cookies: &SessionCookies,
        dry_run: bool,
    ) -> FetchOutcome;
}

#[async_trait]
impl Authenticator for SessionAuthenticator {
    async fn authenticate(
        &self,
        login_url: &str,
        credentials: &Credentials,
        selectors: &SelectorSet,
    ) -> Option<SessionCookies> {
        SessionAuthenticator::authenticate(self, login_url, credentials, selectors).await
    }
}

#[async_trait]
impl Fetcher for DirectFetcher {
    async fn fetch(
        &self,
        url: &str,
        cookies: &SessionCookies,
        save_stem: &Path,
        dry_run: bool,
    ) -> Result<DocumentFormat, FetchError> {
        DirectFetcher::fetch(self, url, cookies, save_stem, dry_run).await
    }

    async fn fetch_page(
        &self,
        url: &str,
        cookies: &SessionCookies,
    ) -> Result<String, FetchError> {
        DirectFetcher::fetch_page(self, url, cookies).await
    }
}

#[async_trait]
impl Downloader for BrowserDownloader {
    async fn download(
        &self,
        url: &str,
        save_stem: &Path,
        cookies: &SessionCookies,
        dry_run: bool,
    ) -> FetchOutcome {
        match BrowserDownloader::download(self, url, save_stem, cookies, dry_run).await {
            Ok(saved) => FetchOutcome::BrowserCapture {
                path: saved.path,
                format: saved.format,
            },
            Err(e) => FetchOutcome::error(e.kind(), e.to_string()),
        }
    }
}

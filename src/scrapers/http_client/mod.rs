//! Authenticated direct download over HTTP.

mod response;
mod user_agent;

pub use response::{body_excerpt, collect_headers, parse_content_disposition_filename};
pub use user_agent::{resolve_user_agent, USER_AGENT};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::{Client, Url};
use tracing::{debug, info, warn};

use super::error::{Exhaustion, FetchError};
use super::retry::RetryPolicy;
use super::types::FetchOutcome;
use crate::config::HttpConfig;
use crate::models::{DocumentFormat, SessionCookies};
use crate::utils::format_from_content_type;
use response::outcome_from_error;

/// Single-GET fetcher replaying session cookies, with bounded retries.
#[derive(Debug, Clone)]
pub struct DirectFetcher {
    user_agent: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    retry: RetryPolicy,
}

impl DirectFetcher {
    /// Create a new fetcher.
    pub fn new(
        user_agent: Option<&str>,
        connect_timeout: Duration,
        read_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            user_agent: resolve_user_agent(user_agent),
            connect_timeout,
            read_timeout,
            retry,
        }
    }

    /// Create a fetcher from the HTTP and retry sections of the config.
    pub fn from_config(http: &HttpConfig, retry: &RetryPolicy) -> Self {
        Self::new(
            http.user_agent.as_deref(),
            Duration::from_secs(http.connect_timeout_secs),
            Duration::from_secs(http.read_timeout_secs),
            retry.clone(),
        )
    }

    /// Build a client whose cookie jar holds the session cookies for `url`.
    fn client_for(&self, url: &Url, cookies: &SessionCookies) -> Result<Client, FetchError> {
        let jar = Jar::default();
        for cookie in cookies {
            let path = if cookie.path.is_empty() { "/" } else { &cookie.path };
            let mut cookie_str = format!("{}={}; Path={}", cookie.name, cookie.value, path);
            let domain = cookie.domain.trim_start_matches('.');
            if !domain.is_empty() {
                cookie_str.push_str("; Domain=");
                cookie_str.push_str(domain);
            }
            if cookie.secure == Some(true) {
                cookie_str.push_str("; Secure");
            }
            jar.add_cookie_str(&cookie_str, url);
        }

        Client::builder()
            .cookie_provider(Arc::new(jar))
            .user_agent(&self.user_agent)
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to create HTTP client: {}", e)))
    }

    /// Issue one GET and read the whole body.
    async fn attempt(&self, client: &Client, url: &Url) -> FetchOutcome {
        let response = match client.get(url.clone()).send().await {
            Ok(r) => r,
            Err(e) => return outcome_from_error(&e),
        };

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());

        match response.bytes().await {
            Ok(body) => FetchOutcome::Http {
                status,
                headers,
                body: body.to_vec(),
            },
            Err(e) => outcome_from_error(&e),
        }
    }

    /// Download `url` and save it under `save_stem` with the inferred extension.
    ///
    /// Retries transient failures per the retry policy. In dry-run mode the
    /// response is fetched and its format reported, but nothing is written.
    pub async fn fetch(
        &self,
        url: &str,
        cookies: &SessionCookies,
        save_stem: &Path,
        dry_run: bool,
    ) -> Result<DocumentFormat, FetchError> {
        let parsed = Url::parse(url)
            .map_err(|e| FetchError::Transport(format!("Invalid URL {}: {}", url, e)))?;
        let client = self.client_for(&parsed, cookies)?;

        let mut attempt: u32 = 0;
        loop {
            debug!(
                "GET {} (attempt {}/{})",
                url,
                attempt + 1,
                self.retry.max_attempts
            );
            let outcome = self.attempt(&client, &parsed).await;

            if let FetchOutcome::Http {
                status: 200,
                headers,
                body,
            } = &outcome
            {
                return self.persist(url, headers, body, save_stem, dry_run).await;
            }

            let decision = self.retry.should_retry(attempt, &outcome);
            if decision.retry {
                warn!(
                    "Transient failure fetching {} ({}), retrying in {:?}",
                    url,
                    describe(&outcome),
                    decision.delay
                );
                tokio::time::sleep(decision.delay).await;
                attempt += 1;
                continue;
            }

            return Err(terminal_error(attempt + 1, outcome));
        }
    }

    async fn persist(
        &self,
        url: &str,
        headers: &std::collections::HashMap<String, String>,
        body: &[u8],
        save_stem: &Path,
        dry_run: bool,
    ) -> Result<DocumentFormat, FetchError> {
        let content_type = headers.get("content-type").map(String::as_str);
        let format = format_from_content_type(content_type);

        if let Some(name) = headers
            .get("content-disposition")
            .and_then(|h| parse_content_disposition_filename(h))
        {
            debug!("Server suggested filename {} for {}", name, url);
        }

        let path = format.path_for(save_stem);
        if dry_run {
            info!(
                "[Dry Run] Would save {} bytes ({}) to {}",
                body.len(),
                content_type.unwrap_or("no content type"),
                path.display()
            );
            return Ok(format);
        }

        tokio::fs::write(&path, body)
            .await
            .map_err(|source| FetchError::Filesystem {
                path: path.clone(),
                source,
            })?;

        info!("Saved {} bytes from {} to {}", body.len(), url, path.display());
        Ok(format)
    }

    /// Fetch `url` once as an HTML page, ignoring the retry policy.
    pub async fn fetch_page(
        &self,
        url: &str,
        cookies: &SessionCookies,
    ) -> Result<String, FetchError> {
        let parsed = Url::parse(url)
            .map_err(|e| FetchError::Transport(format!("Invalid URL {}: {}", url, e)))?;
        let client = self.client_for(&parsed, cookies)?;

        match self.attempt(&client, &parsed).await {
            FetchOutcome::Http {
                status: 200, body, ..
            } => Ok(String::from_utf8_lossy(&body).into_owned()),
            FetchOutcome::Http { status, body, .. } => Err(FetchError::Status {
                status,
                body: body_excerpt(&body),
            }),
            other => Err(FetchError::Transport(describe(&other))),
        }
    }
}

fn describe(outcome: &FetchOutcome) -> String {
    match outcome {
        FetchOutcome::Http { status, .. } => format!("HTTP {}", status),
        FetchOutcome::Error { kind, detail } => format!("{:?}: {}", kind, detail),
        FetchOutcome::BrowserCapture { path, .. } => format!("captured {}", path.display()),
    }
}

/// Error for an attempt that will not be retried.
fn terminal_error(attempts: u32, outcome: FetchOutcome) -> FetchError {
    if RetryPolicy::is_retryable(&outcome) {
        let exhaustion = match outcome.status() {
            Some(status) => Exhaustion::Status(status),
            None => Exhaustion::TimedOut,
        };
        return FetchError::RetryExhausted {
            attempts,
            exhaustion,
        };
    }

    match outcome {
        FetchOutcome::Http { status, body, .. } => FetchError::Status {
            status,
            body: body_excerpt(&body),
        },
        other => FetchError::Transport(describe(&other)),
    }
}

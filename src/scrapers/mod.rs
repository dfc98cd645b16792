//! Acquisition strategies for the newspaper site.
//!
//! Direct HTTP download, landing-page link scraping, and the headless
//! browser login and download fallback, plus the retry policy they share.

pub mod browser;
pub mod error;
mod http_client;
pub mod link_scraper;
pub mod retry;
pub mod types;

pub use browser::{
    find_chrome, BrowserDownloader, BrowserEngineConfig, LoginStage, SessionAuthenticator,
    UrlPattern,
};
pub use error::{BrowserError, Exhaustion, FetchError};
pub use http_client::{parse_content_disposition_filename, DirectFetcher, USER_AGENT};
pub use link_scraper::{extract_link, resolve_link};
pub use retry::{parse_retry_after, RetryDecision, RetryPolicy};
pub use types::{FailureKind, FetchOutcome};

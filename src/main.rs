//! newsacquire - daily newspaper edition downloader.
//!
//! Logs in to the publisher's site and saves the dated edition as PDF or
//! HTML, falling back from direct download to link scraping to a headless
//! browser.

use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsacquire::cli;
use newsacquire::config::ENV_FILE_ENV;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let env_path = std::env::var(ENV_FILE_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".env"));
    let _ = dotenvy::from_path_override(&env_path);

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "newsacquire=info"
    } else {
        "newsacquire=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run CLI
    cli::run().await
}

//! CLI commands implementation.

use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::Parser;
use console::style;
use tracing::warn;

use crate::config::Config;
use crate::models::{AcquisitionRequest, Credentials};
use crate::scrapers::find_chrome;
use crate::services::AcquisitionOrchestrator;

#[derive(Parser, Debug)]
#[command(name = "newsacquire")]
#[command(about = "Download the daily newspaper edition from an authenticated site")]
#[command(version)]
pub struct Cli {
    /// Edition date (YYYY-MM-DD); defaults to today
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Log in and resolve the download without writing any file
    #[arg(long)]
    dry_run: bool,

    /// Download even if the edition already exists locally
    #[arg(long)]
    force_download: bool,

    /// Config file (YAML, TOML or JSON)
    #[arg(short, long, env = "NEWSPAPER_CONFIG")]
    config: Option<PathBuf>,

    /// Validate configuration and browser availability, then exit
    #[arg(long)]
    check: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid date format: '{}' (expected YYYY-MM-DD)", value))
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).await?;

    if cli.check {
        return cmd_check(&config);
    }

    for warning in config.validate()? {
        warn!("{}", warning);
    }

    let target_date = cli.date.unwrap_or_else(|| Local::now().date_naive());
    cmd_acquire(&config, target_date, cli.dry_run, cli.force_download).await
}

async fn cmd_acquire(
    config: &Config,
    target_date: NaiveDate,
    dry_run: bool,
    force_download: bool,
) -> anyhow::Result<()> {
    let download_dir = config.download_dir();
    if !dry_run {
        tokio::fs::create_dir_all(&download_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create download directory {}",
                    download_dir.display()
                )
            })?;
    }

    let request = AcquisitionRequest {
        base_url: config.newspaper.url.clone(),
        login_url: config.newspaper.login_url().to_string(),
        credentials: Credentials::new(
            config.newspaper.username.clone(),
            config.newspaper.password.clone(),
        ),
        save_path_stem: AcquisitionRequest::default_stem(&download_dir, target_date),
        target_date,
        dry_run,
        force_download,
    };

    if dry_run {
        eprintln!(
            "{} Dry run: nothing will be written",
            style("!").yellow()
        );
    }

    let orchestrator = AcquisitionOrchestrator::from_config(config);
    let result = orchestrator.acquire(&request).await;

    let (success, message) = result.into_pair();
    if success {
        println!(
            "{} {} edition acquired as {}",
            style("✓").green(),
            request.date_string(),
            style(format!(
                "{}.{}",
                request.save_path_stem.display(),
                message
            ))
            .cyan()
        );
        Ok(())
    } else {
        eprintln!(
            "{} {} edition not acquired: {}",
            style("✗").red(),
            request.date_string(),
            message
        );
        std::process::exit(1);
    }
}

/// Print the effective configuration and whether a browser is available.
fn cmd_check(config: &Config) -> anyhow::Result<()> {
    println!("\n{}", style("Configuration").bold());
    match &config.source_path {
        Some(path) => println!("  {} Source: {}", style("→").dim(), path.display()),
        None => println!("  {} Source: environment and defaults", style("→").dim()),
    }
    for (key, value) in config.redacted_summary() {
        println!("  {:<45} {}", key, value);
    }

    let mut healthy = true;
    println!();
    match config.validate() {
        Ok(warnings) => {
            println!("{} Configuration valid", style("✓").green());
            for warning in warnings {
                println!("  {} {}", style("!").yellow(), warning);
            }
        }
        Err(e) => {
            healthy = false;
            println!("{} {}", style("✗").red(), e);
        }
    }

    if config.browser.remote_url.is_some() {
        println!("{} Using remote browser", style("✓").green());
    } else {
        match find_chrome(config.browser.executable.as_deref()) {
            Some(path) => println!("{} Browser: {}", style("✓").green(), path.display()),
            None => {
                healthy = false;
                println!(
                    "{} No Chrome/Chromium found (set browser.executable or CHROME_PATH)",
                    style("✗").red()
                );
            }
        }
    }

    if !healthy {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-03-01"),
            Ok(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        let err = parse_date("01.03.2024").unwrap_err();
        assert!(err.starts_with("Invalid date format"));
        assert!(parse_date("2024-02-30").is_err());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "newsacquire",
            "--date",
            "2024-03-01",
            "--dry-run",
            "--force-download",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert!(cli.dry_run);
        assert!(cli.force_download);
        assert!(cli.verbose);
        assert!(!cli.check);

        assert!(Cli::try_parse_from(["newsacquire", "--date", "yesterday"]).is_err());
    }
}

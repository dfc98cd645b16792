//! newsacquire - authenticated acquisition of a daily newspaper edition.
//!
//! The pipeline skips work when the edition already exists, logs in through
//! a headless browser, then tries a direct download, a link scraped from
//! the landing page, and finally a browser-driven download.

pub mod cli;
pub mod config;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod utils;

pub use config::Config;
pub use models::{AcquisitionRequest, AcquisitionResult, DocumentFormat};
pub use services::AcquisitionOrchestrator;

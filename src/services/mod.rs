//! Service layer for newsacquire business logic.
//!
//! This module contains domain logic separated from UI concerns.
//! Services can be used by the CLI or an external pipeline.

pub mod acquisition;

pub use acquisition::{
    existing_document, AcquisitionOrchestrator, Authenticator, Downloader, Fetcher,
    AUTH_FAILURE_REASON,
};

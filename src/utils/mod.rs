//! Shared utility functions.

mod mime;

pub use mime::{classify_content_type, format_from_content_type, format_from_filename};

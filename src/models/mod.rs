//! Domain models for newspaper acquisition.

mod acquisition;

pub use acquisition::{
    AcquisitionRequest, AcquisitionResult, Credentials, DocumentFormat, SavedDocument,
    SessionCookie, SessionCookies,
};

//! Error taxonomy for asset loading, editing and rendering

use std::time::Duration;

/// Errors surfaced by the stamp widget and its collaborators
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum StampError {
    /// An asset could not be fetched
    #[error("resource `{name}` unavailable: {reason}")]
    ResourceUnavailable { name: String, reason: String },

    /// Document bytes could not be decoded, edited, serialised or rendered
    #[error("malformed document: {detail}")]
    MalformedDocument { detail: String },

    /// The background worker hung up
    #[error("stamp worker is gone")]
    WorkerGone,

    /// Waiting for in-flight work exceeded the allowed time
    #[error("work still in flight after {waited:?}")]
    Timeout { waited: Duration },
}

impl StampError {
    pub fn unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedDocument {
            detail: detail.into(),
        }
    }
}

impl From<lopdf::Error> for StampError {
    fn from(e: lopdf::Error) -> Self {
        Self::malformed(format!("PDF model: {e}"))
    }
}

impl From<mupdf::error::Error> for StampError {
    fn from(e: mupdf::error::Error) -> Self {
        Self::malformed(format!("PDF engine: {e}"))
    }
}

impl From<image::ImageError> for StampError {
    fn from(e: image::ImageError) -> Self {
        Self::malformed(format!("stamp image: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, StampError>;

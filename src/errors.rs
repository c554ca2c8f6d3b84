use thiserror::Error;

/// Errors raised by the metadata core.
///
/// Facet extraction and search never fail on well-formed input; these cover
/// the two ways a caller can hand us something malformed.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Persisted metadata is not the expected JSON array shape.
    #[error("metadata format error: {0}")]
    Format(String),

    /// Search parameters or raw detector output are malformed.
    #[error("validation error: {0}")]
    Validation(String),
}

impl MetadataError {
    pub fn format(msg: impl Into<String>) -> Self {
        MetadataError::Format(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        MetadataError::Validation(msg.into())
    }
}

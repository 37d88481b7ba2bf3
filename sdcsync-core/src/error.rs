use thiserror::Error;

/// Minimum plausible size of a downloaded image, in bytes.
pub const MIN_IMAGE_BYTES: usize = 50;

#[derive(Error, Debug)]
pub enum SyncError {
    /// No identifier could be extracted from the page.
    #[error("Parse failure: {0}")]
    ParseFailure(String),

    /// Catalog record unusable or stale id could not be re-resolved.
    #[error("Resolution failure: {0}")]
    ResolutionFailure(String),

    /// Image or page download failed. Never cached.
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// Fact exists but is outside the supported allow-list.
    #[error("Policy failure: {0}")]
    PolicyFailure(String),

    #[error("Perceptual hash error: {0}")]
    PerceptualHashError(String),

    #[error("Cache error: {0}")]
    CacheError(#[from] rusqlite::Error),

    #[error("Cache inconsistency: requested {requested}, stored {stored}")]
    CacheUrlMismatch { requested: String, stored: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

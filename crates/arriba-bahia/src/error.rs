//! Error type for the bahia interchange.

use thiserror::Error;

/// Result alias for bahia operations.
pub type Result<T> = std::result::Result<T, BahiaError>;

/// Unified error type for reading, writing and bridging bahia documents.
#[derive(Debug, Error)]
pub enum BahiaError {
    /// Malformed container or manifest.
    #[error("invalid bahia container: {message}")]
    Format { message: String },

    /// JSON decoding or encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Zip container error.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Underlying storage error.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the arriba engine while bridging.
    #[error(transparent)]
    Archive(#[from] arriba_core::error::ArribaError),
}

impl BahiaError {
    /// Create a `Format` error with the given message.
    pub fn format(message: impl Into<String>) -> Self {
        BahiaError::Format {
            message: message.into(),
        }
    }
}

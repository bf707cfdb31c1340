//! Error types for backing map operations.

use thiserror::Error;

/// Result type for backing map operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that a backing map may raise.
///
/// The overlay never interprets these; they are propagated to whoever
/// triggered the backing call, with any store lock already released.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend rejected or failed an operation.
    #[error("backend failure: {0}")]
    Backend(String),
}

impl StorageError {
    /// Creates a backend failure error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

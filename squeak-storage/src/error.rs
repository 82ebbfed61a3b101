//! Storage error types.

use squeak_core::SqueakError;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A squeak was rejected on insert.
    #[error("Invalid squeak: {0}")]
    InvalidSqueak(#[from] SqueakError),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("Store lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl StorageError {
    pub(crate) fn poisoned<T>(store: &'static str) -> impl FnOnce(T) -> StorageError {
        move |_| StorageError::LockPoisoned(store)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

//! Storage error mapping into the core error model.

use aasanify_core::StoreError;
use thiserror::Error;

/// Errors raised by the SQLite layer before conversion to the core model.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Sqlite(e) => StoreError::backend(e),
            StorageError::Serde(e) => StoreError::backend(e),
        }
    }
}

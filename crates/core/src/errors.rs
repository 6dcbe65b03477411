//! Error types shared across the sync core.

use thiserror::Error;

/// Result type alias for sync core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the durable local store.
///
/// These indicate a broken durability guarantee and always propagate to the
/// caller. Variants are string-backed and `Clone` so a failed cycle result
/// can be broadcast to coalesced sync waiters over a watch channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Database read/write failure
    #[error("database failure: {0}")]
    Backend(String),

    /// A stored record could not be decoded
    #[error("corrupt record at {key}: {detail}")]
    Corrupt { key: String, detail: String },
}

impl StoreError {
    /// Create a backend error from any displayable cause
    pub fn backend(detail: impl std::fmt::Display) -> Self {
        Self::Backend(detail.to_string())
    }

    /// Create a corrupt-record error for a given logical key
    pub fn corrupt(key: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::Corrupt {
            key: key.into(),
            detail: detail.to_string(),
        }
    }
}

/// Errors that can escape the sync core's public operations.
///
/// Remote failures never appear here; the coordinator folds them into its
/// structured outcome instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Local durability failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The user id is empty or otherwise unusable; sync must only ever be
    /// invoked with a valid authenticated id.
    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),
}

//! Remote store capability contract.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::practice::{SessionRecord, UserId, UserProfile};

/// Failure modes of the remote store, classified for retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Transport failure or timeout; expected and always retryable.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The remote reached a decision and rejected the request.
    #[error("remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The payload is structurally invalid and will never be accepted;
    /// retrying it is a poison-pill loop.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl RemoteError {
    /// Create an unavailable error from any displayable cause
    pub fn unavailable(detail: impl std::fmt::Display) -> Self {
        Self::Unavailable(detail.to_string())
    }

    /// Create a rejection error from status and message
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Whether a failed push should stay queued for a later cycle.
    ///
    /// Rejections are retried like outages; only structural invalidity is
    /// permanent, and adapters map validation statuses to `InvalidPayload`.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Rejected { .. } => true,
            Self::InvalidPayload(_) => false,
        }
    }
}

/// Capability contract the sync engine requires from the authoritative
/// backend.
///
/// Writes are idempotent full-value replacements, so re-pushing the same key
/// after an ambiguous failure is always safe.
#[async_trait]
pub trait RemoteStoreTrait: Send + Sync {
    async fn get_profile(&self, user: &UserId) -> Result<Option<UserProfile>, RemoteError>;

    async fn put_profile(&self, user: &UserId, profile: &UserProfile)
        -> Result<(), RemoteError>;

    async fn get_session(
        &self,
        user: &UserId,
        date: NaiveDate,
    ) -> Result<Option<SessionRecord>, RemoteError>;

    async fn put_session(
        &self,
        user: &UserId,
        date: NaiveDate,
        record: &SessionRecord,
    ) -> Result<(), RemoteError>;

    async fn all_sessions(
        &self,
        user: &UserId,
    ) -> Result<BTreeMap<NaiveDate, SessionRecord>, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(RemoteError::unavailable("connection refused").is_retryable());
        assert!(RemoteError::rejected(500, "internal").is_retryable());
        assert!(RemoteError::rejected(429, "slow down").is_retryable());
        assert!(!RemoteError::InvalidPayload("missing field".into()).is_retryable());
    }
}

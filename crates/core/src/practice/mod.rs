//! Practice-domain models and the local store contract.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, StoreError};
use crate::sync::{PendingKind, PendingOperation};

/// Authenticated user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Build a user id, rejecting empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> Result<Self, Error> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(Error::InvalidUserId(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// User profile.
///
/// One per authenticated user; superseded wholesale on conflict resolution,
/// never merged field by field. Field names follow the backend contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub age: u32,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// One completed practice session, keyed externally by calendar date.
///
/// At most one record exists per date; writing an existing date replaces the
/// record in full. Records are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub completed: bool,
    pub duration_minutes: u32,
    pub rounds_done: u32,
    pub session_type: String,
}

/// Contract for the durable local cache and pending operation log.
///
/// Every operation is synchronous and durable before it returns; reads of
/// absent keys yield `None`, not errors. Each write is a whole-record
/// replace, which is the atomic-per-key primitive shared by the UI write
/// path and the sync pull phase.
pub trait PracticeStoreTrait: Send + Sync {
    fn get_profile(&self) -> Result<Option<UserProfile>, StoreError>;

    /// Cache-only profile write, used when adopting remote state.
    fn put_profile(&self, profile: &UserProfile) -> Result<(), StoreError>;

    fn get_session(&self, date: NaiveDate) -> Result<Option<SessionRecord>, StoreError>;

    /// Cache-only session write, used when adopting remote state.
    fn put_session(&self, date: NaiveDate, record: &SessionRecord) -> Result<(), StoreError>;

    fn all_sessions(&self) -> Result<BTreeMap<NaiveDate, SessionRecord>, StoreError>;

    /// UI write path: cache the profile and enqueue its push marker in one
    /// atomic step.
    fn record_profile(&self, profile: &UserProfile) -> Result<(), StoreError>;

    /// UI write path: cache the session and enqueue its push marker in one
    /// atomic step.
    fn record_session(&self, date: NaiveDate, record: &SessionRecord) -> Result<(), StoreError>;

    /// Idempotent per `(kind, key)`: an existing entry keeps its queue slot
    /// and only has its revision bumped.
    fn enqueue(&self, kind: PendingKind, key: &str) -> Result<(), StoreError>;

    /// Pending entries in first-enqueue order, oldest first.
    fn pending(&self) -> Result<Vec<PendingOperation>, StoreError>;

    /// Remove `op` only if its revision is unchanged, returning whether a
    /// row was removed. A bumped revision means the key was rewritten while
    /// the push was in flight and must stay queued.
    fn acknowledge(&self, op: &PendingOperation) -> Result<bool, StoreError>;

    /// Unconditional removal; absent entries are a no-op.
    fn remove_pending(&self, kind: PendingKind, key: &str) -> Result<(), StoreError>;

    fn last_sync(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    fn set_last_sync(&self, at: DateTime<Utc>) -> Result<(), StoreError>;
}

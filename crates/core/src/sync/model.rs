//! Sync domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pending-log key for the (single) user profile.
pub const PROFILE_KEY: &str = "profile";

/// Which logical record a pending operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    Profile,
    Session,
}

/// Marker that a local record has a value not yet confirmed on the remote
/// store.
///
/// Unique per `(kind, key)`. `revision` increments on every re-enqueue of an
/// existing key so the push drain can acknowledge exactly the value it read:
/// if the key was rewritten mid-flight the revision no longer matches and
/// the entry stays queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    pub kind: PendingKind,
    pub key: String,
    pub enqueued_at: DateTime<Utc>,
    pub revision: i64,
}

/// Overall classification of one sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Everything pending was pushed and the pull completed.
    Clean,
    /// At least one push or pull step failed and will be retried later.
    Partial,
    /// The device was offline; nothing was attempted.
    Offline,
}

/// Cycle metrics returned by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub status: SyncStatus,
    /// Pending entries confirmed written to the remote store.
    pub pushed: usize,
    /// Pending entries deferred by a retryable remote failure.
    pub push_failed: usize,
    /// Pending entries discarded as unpushable poison pills.
    pub dropped: usize,
    /// Remote records adopted into the local cache.
    pub pulled: usize,
    pub duration_ms: i64,
}

impl SyncOutcome {
    pub(crate) fn offline() -> Self {
        Self {
            status: SyncStatus::Offline,
            pushed: 0,
            push_failed: 0,
            dropped: 0,
            pulled: 0,
            duration_ms: 0,
        }
    }
}

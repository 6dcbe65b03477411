//! Deterministic conflict resolution for pulled remote state.
//!
//! Two different policies on purpose: profiles can legitimately be edited on
//! two devices, so the later `createdAt` wins; sessions are append/replace-
//! once records, so the local copy always wins a date collision and the
//! remote only fills gaps.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::practice::{SessionRecord, UserProfile};

/// Which replica's profile should be kept after a pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileResolution {
    /// Replicas already agree (or neither exists); nothing to do.
    Converged,
    /// Adopt the remote copy into the local cache; no push needed.
    AdoptRemote,
    /// The local copy wins; keep it cached and queue a push so the remote
    /// converges.
    PushLocal,
}

/// Coarse last-writer-wins on `createdAt`. No field-level merge: the winner
/// supersedes the loser wholesale.
pub fn resolve_profile(
    local: Option<&UserProfile>,
    remote: Option<&UserProfile>,
) -> ProfileResolution {
    match (local, remote) {
        (None, None) => ProfileResolution::Converged,
        (None, Some(_)) => ProfileResolution::AdoptRemote,
        (Some(_), None) => ProfileResolution::PushLocal,
        (Some(local), Some(remote)) => {
            if remote.created_at > local.created_at {
                ProfileResolution::AdoptRemote
            } else if local.created_at > remote.created_at {
                ProfileResolution::PushLocal
            } else {
                ProfileResolution::Converged
            }
        }
    }
}

/// Remote sessions worth adopting: dates absent from the local cache.
///
/// The merged collection is the union keyed by date with local precedence on
/// collisions, so these are the only records the pull phase writes.
pub fn sessions_to_adopt(
    local: &BTreeMap<NaiveDate, SessionRecord>,
    remote: BTreeMap<NaiveDate, SessionRecord>,
) -> BTreeMap<NaiveDate, SessionRecord> {
    remote
        .into_iter()
        .filter(|(date, _)| !local.contains_key(date))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(created_at: &str) -> UserProfile {
        UserProfile {
            name: "Asha".into(),
            age: 29,
            email: "asha@example.com".into(),
            created_at: created_at.parse().expect("timestamp"),
        }
    }

    fn session(session_type: &str) -> SessionRecord {
        SessionRecord {
            completed: true,
            duration_minutes: 10,
            rounds_done: 3,
            session_type: session_type.into(),
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().expect("date")
    }

    #[test]
    fn later_created_at_wins() {
        let older = profile("2024-01-01T00:00:00Z");
        let newer = profile("2024-02-01T00:00:00Z");
        assert_eq!(
            resolve_profile(Some(&older), Some(&newer)),
            ProfileResolution::AdoptRemote
        );
        assert_eq!(
            resolve_profile(Some(&newer), Some(&older)),
            ProfileResolution::PushLocal
        );
    }

    #[test]
    fn single_sided_profile_wins() {
        let only = profile("2024-01-01T00:00:00Z");
        assert_eq!(
            resolve_profile(None, Some(&only)),
            ProfileResolution::AdoptRemote
        );
        assert_eq!(
            resolve_profile(Some(&only), None),
            ProfileResolution::PushLocal
        );
        assert_eq!(resolve_profile(None, None), ProfileResolution::Converged);
    }

    #[test]
    fn equal_timestamps_are_converged() {
        let a = profile("2024-01-01T00:00:00Z");
        let b = profile("2024-01-01T00:00:00Z");
        assert_eq!(
            resolve_profile(Some(&a), Some(&b)),
            ProfileResolution::Converged
        );
    }

    #[test]
    fn local_session_wins_collision_remote_fills_gaps() {
        let local = BTreeMap::from([(date("2024-01-01"), session("local"))]);
        let remote = BTreeMap::from([
            (date("2024-01-01"), session("remote")),
            (date("2024-01-02"), session("remote")),
        ]);

        let adopted = sessions_to_adopt(&local, remote);
        assert_eq!(adopted.len(), 1);
        assert_eq!(
            adopted.get(&date("2024-01-02")).map(|s| s.session_type.as_str()),
            Some("remote")
        );
    }
}

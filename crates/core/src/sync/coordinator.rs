//! Push-then-pull sync cycle orchestration.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::time::timeout;

use crate::connectivity::ConnectivityObserver;
use crate::errors::Result;
use crate::practice::{PracticeStoreTrait, UserId};
use crate::sync::{
    resolve_profile, sessions_to_adopt, PendingKind, PendingOperation, ProfileResolution,
    RemoteError, RemoteStoreTrait, SyncOutcome, SyncStatus, PROFILE_KEY,
};

/// Default budget for one remote call; an unresponsive call must not stall
/// the rest of the push phase.
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;

type SharedCycle = watch::Receiver<Option<Result<SyncOutcome>>>;

enum CycleEntry {
    Owner(watch::Sender<Option<Result<SyncOutcome>>>),
    Waiter(SharedCycle),
}

/// Frees the per-user slot when the owning future finishes or is dropped at
/// an await point, so a cancelled owner never leaves waiters parked on a
/// dead channel.
struct CycleSlot<'a> {
    in_flight: &'a Mutex<HashMap<UserId, SharedCycle>>,
    user: &'a UserId,
}

impl Drop for CycleSlot<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .expect("sync registry lock poisoned")
            .remove(self.user);
    }
}

enum PushDisposition {
    /// Remote write confirmed. The entry was acknowledged, or kept queued
    /// because the key was rewritten mid-flight.
    Pushed,
    /// Retryable remote failure; the entry stays queued for the next cycle.
    Deferred,
    /// Poison entry removed from the queue.
    Dropped,
}

/// Orchestrates push-then-pull cycles against the remote store.
///
/// At most one cycle runs per user at a time; callers arriving while one is
/// in flight await and share its outcome. Cycles for different users are
/// independent.
pub struct SyncCoordinator {
    store: Arc<dyn PracticeStoreTrait>,
    remote: Arc<dyn RemoteStoreTrait>,
    connectivity: ConnectivityObserver,
    remote_timeout: Duration,
    in_flight: Mutex<HashMap<UserId, SharedCycle>>,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<dyn PracticeStoreTrait>,
        remote: Arc<dyn RemoteStoreTrait>,
        connectivity: ConnectivityObserver,
    ) -> Self {
        Self {
            store,
            remote,
            connectivity,
            remote_timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Override the per-remote-call timeout.
    pub fn with_remote_timeout(mut self, remote_timeout: Duration) -> Self {
        self.remote_timeout = remote_timeout;
        self
    }

    /// Run one sync cycle for `user`, or coalesce onto the in-flight one.
    ///
    /// Remote failures never escape as errors; they are folded into the
    /// returned [`SyncOutcome`]. Local store failures do propagate, since
    /// they break the durability guarantee the caller relies on.
    pub async fn sync(&self, user: &UserId) -> Result<SyncOutcome> {
        loop {
            let entry = {
                let mut in_flight = self
                    .in_flight
                    .lock()
                    .expect("sync registry lock poisoned");
                match in_flight.get(user) {
                    Some(shared) => CycleEntry::Waiter(shared.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        in_flight.insert(user.clone(), rx);
                        CycleEntry::Owner(tx)
                    }
                }
            };

            match entry {
                CycleEntry::Waiter(mut shared) => {
                    debug!("sync already in flight for {user}, coalescing");
                    loop {
                        if let Some(result) = shared.borrow_and_update().clone() {
                            return result;
                        }
                        if shared.changed().await.is_err() {
                            // Owner was cancelled before publishing; race to
                            // take over the freed slot.
                            warn!("in-flight sync for {user} was cancelled, retrying");
                            break;
                        }
                    }
                }
                CycleEntry::Owner(tx) => {
                    let _slot = CycleSlot {
                        in_flight: &self.in_flight,
                        user,
                    };
                    let result = self.run_cycle(user).await;
                    let _ = tx.send(Some(result.clone()));
                    return result;
                }
            }
        }
    }

    async fn run_cycle(&self, user: &UserId) -> Result<SyncOutcome> {
        if !self.connectivity.is_online() {
            debug!("sync skipped for {user}: offline");
            return Ok(SyncOutcome::offline());
        }

        let started_at = std::time::Instant::now();
        let mut outcome = SyncOutcome {
            status: SyncStatus::Clean,
            pushed: 0,
            push_failed: 0,
            dropped: 0,
            pulled: 0,
            duration_ms: 0,
        };

        self.push_phase(user, &mut outcome).await?;
        // Pull always runs after push, even a partially failed one, so
        // locally pending writes are never clobbered by a stale pull.
        let pull_clean = self.pull_phase(user, &mut outcome).await?;

        // The marker records the most recent attempt, not the most recent
        // clean cycle; pacing logic only needs recency.
        self.store.set_last_sync(Utc::now())?;

        outcome.duration_ms = started_at.elapsed().as_millis() as i64;
        outcome.status = if outcome.push_failed == 0 && pull_clean {
            SyncStatus::Clean
        } else {
            SyncStatus::Partial
        };
        info!(
            "sync cycle for {user}: {:?} pushed={} failed={} dropped={} pulled={} in {}ms",
            outcome.status,
            outcome.pushed,
            outcome.push_failed,
            outcome.dropped,
            outcome.pulled,
            outcome.duration_ms
        );
        Ok(outcome)
    }

    /// Drain the pending log snapshot in enqueue order. A failure on one
    /// item never aborts the rest of the phase.
    async fn push_phase(&self, user: &UserId, outcome: &mut SyncOutcome) -> Result<()> {
        let pending = self.store.pending()?;
        if pending.is_empty() {
            return Ok(());
        }
        debug!("push phase for {user}: {} pending entries", pending.len());

        for op in pending {
            match self.push_one(user, &op).await? {
                PushDisposition::Pushed => outcome.pushed += 1,
                PushDisposition::Deferred => outcome.push_failed += 1,
                PushDisposition::Dropped => outcome.dropped += 1,
            }
        }
        Ok(())
    }

    async fn push_one(&self, user: &UserId, op: &PendingOperation) -> Result<PushDisposition> {
        // Payload is re-read from the cache at drain time so the most recent
        // local value is what gets pushed.
        let sent = match op.kind {
            PendingKind::Profile => match self.store.get_profile()? {
                Some(profile) => {
                    self.with_timeout(self.remote.put_profile(user, &profile))
                        .await
                }
                None => {
                    warn!("dropping pending profile push for {user}: no cached profile");
                    self.store.remove_pending(op.kind, &op.key)?;
                    return Ok(PushDisposition::Dropped);
                }
            },
            PendingKind::Session => {
                let Ok(date) = op.key.parse::<NaiveDate>() else {
                    warn!(
                        "dropping pending session push for {user}: bad date key {:?}",
                        op.key
                    );
                    self.store.remove_pending(op.kind, &op.key)?;
                    return Ok(PushDisposition::Dropped);
                };
                match self.store.get_session(date)? {
                    Some(record) => {
                        self.with_timeout(self.remote.put_session(user, date, &record))
                            .await
                    }
                    None => {
                        warn!("dropping pending session push for {user}: no cached record for {date}");
                        self.store.remove_pending(op.kind, &op.key)?;
                        return Ok(PushDisposition::Dropped);
                    }
                }
            }
        };

        match sent {
            Ok(()) => {
                if !self.store.acknowledge(op)? {
                    debug!(
                        "{:?} {:?} rewritten during push, keeping it queued",
                        op.kind, op.key
                    );
                }
                Ok(PushDisposition::Pushed)
            }
            Err(err) if err.is_retryable() => {
                debug!("push of {:?} {:?} deferred: {err}", op.kind, op.key);
                Ok(PushDisposition::Deferred)
            }
            Err(err) => {
                warn!("dropping unpushable {:?} {:?}: {err}", op.kind, op.key);
                self.store.remove_pending(op.kind, &op.key)?;
                Ok(PushDisposition::Dropped)
            }
        }
    }

    /// Fetch remote state and reconcile it into the cache. Returns whether
    /// both fetches succeeded.
    async fn pull_phase(&self, user: &UserId, outcome: &mut SyncOutcome) -> Result<bool> {
        let mut clean = true;

        match self.with_timeout(self.remote.get_profile(user)).await {
            Ok(remote_profile) => {
                let local_profile = self.store.get_profile()?;
                match resolve_profile(local_profile.as_ref(), remote_profile.as_ref()) {
                    ProfileResolution::Converged => {}
                    ProfileResolution::AdoptRemote => {
                        if let Some(profile) = remote_profile {
                            self.store.put_profile(&profile)?;
                            outcome.pulled += 1;
                        }
                    }
                    ProfileResolution::PushLocal => {
                        self.store.enqueue(PendingKind::Profile, PROFILE_KEY)?;
                    }
                }
            }
            Err(err) => {
                debug!("profile pull for {user} deferred: {err}");
                clean = false;
            }
        }

        match self.with_timeout(self.remote.all_sessions(user)).await {
            Ok(remote_sessions) => {
                let local_sessions = self.store.all_sessions()?;
                for (date, record) in sessions_to_adopt(&local_sessions, remote_sessions) {
                    self.store.put_session(date, &record)?;
                    outcome.pulled += 1;
                }
            }
            Err(err) => {
                debug!("session pull for {user} deferred: {err}");
                clean = false;
            }
        }

        Ok(clean)
    }

    async fn with_timeout<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, RemoteError>>,
    ) -> std::result::Result<T, RemoteError> {
        match timeout(self.remote_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::unavailable(format!(
                "remote call exceeded {:?}",
                self.remote_timeout
            ))),
        }
    }
}

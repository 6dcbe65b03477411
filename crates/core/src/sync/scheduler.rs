//! Pacing constants and the background retry scheduler.
//!
//! Connectivity edges and app-level triggers alone can starve a retry when
//! no edge ever fires, so the loop always has a time-based fallback with
//! exponential backoff after failed cycles.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use rand::Rng;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::auth::AuthProviderTrait;
use crate::connectivity::ConnectivityObserver;
use crate::sync::{SyncCoordinator, SyncStatus};

/// Foreground sync cadence in seconds.
pub const SYNC_FOREGROUND_INTERVAL_SECS: u64 = 45;

/// Maximum jitter (seconds) added to periodic cycle intervals.
pub const SYNC_INTERVAL_JITTER_SECS: u64 = 5;

/// Exponential backoff in seconds with cap.
pub fn backoff_seconds(consecutive_failures: i32) -> i64 {
    const MAX_EXPONENT: i32 = 8;
    const BASE_DELAY_SECONDS: i64 = 5;

    let capped = consecutive_failures.clamp(0, MAX_EXPONENT);
    2_i64.pow(capped as u32) * BASE_DELAY_SECONDS
}

fn paced_interval(consecutive_failures: i32) -> Duration {
    if consecutive_failures > 0 {
        Duration::from_secs(backoff_seconds(consecutive_failures) as u64)
    } else {
        let jitter = rand::thread_rng().gen_range(0..=SYNC_INTERVAL_JITTER_SECS);
        Duration::from_secs(SYNC_FOREGROUND_INTERVAL_SECS + jitter)
    }
}

/// Background loop that paces sync cycles and reacts to online edges.
pub struct SyncScheduler {
    coordinator: Arc<SyncCoordinator>,
    auth: Arc<dyn AuthProviderTrait>,
    connectivity: ConnectivityObserver,
}

/// Handle to a running scheduler loop.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop. An in-flight cycle is allowed to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

impl SyncScheduler {
    pub fn new(
        coordinator: Arc<SyncCoordinator>,
        auth: Arc<dyn AuthProviderTrait>,
        connectivity: ConnectivityObserver,
    ) -> Self {
        Self {
            coordinator,
            auth,
            connectivity,
        }
    }

    /// Spawn the scheduler task.
    pub fn spawn(self) -> SchedulerHandle {
        let Self {
            coordinator,
            auth,
            connectivity,
        } = self;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let online = Arc::new(Notify::new());
        let notify = Arc::clone(&online);
        let subscription = connectivity.on_became_online(move || notify.notify_one());

        let task = tokio::spawn(async move {
            // Keeps the online-edge callback registered for the life of the
            // loop.
            let _subscription = subscription;
            let mut consecutive_failures = 0_i32;
            info!("sync scheduler started");

            loop {
                let wait = paced_interval(consecutive_failures);
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = online.notified() => {
                        debug!("sync scheduler woken by online edge");
                    }
                    _ = shutdown_rx.changed() => break,
                }

                let Some(user) = auth.current_user() else {
                    consecutive_failures = 0;
                    continue;
                };

                match coordinator.sync(&user).await {
                    Ok(outcome) => {
                        consecutive_failures = match outcome.status {
                            SyncStatus::Clean | SyncStatus::Offline => 0,
                            SyncStatus::Partial => consecutive_failures.saturating_add(1),
                        };
                    }
                    Err(err) => {
                        consecutive_failures = consecutive_failures.saturating_add(1);
                        error!("sync cycle failed for {user}: {err}");
                    }
                }
            }
            info!("sync scheduler stopped");
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

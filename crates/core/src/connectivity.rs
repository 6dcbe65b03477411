//! Edge-triggered connectivity observation.
//!
//! Raw platform notifications flow in through [`ConnectivityObserver::report`];
//! subscribers are notified exactly once per offline-to-online transition,
//! never on repeated online notifications.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use log::{debug, warn};

type OnlineCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct ObserverState {
    is_connected: bool,
    is_internet_reachable: bool,
    was_online: bool,
    next_id: u64,
    callbacks: Vec<(u64, OnlineCallback)>,
}

/// Watches network reachability and raises a single "became online" event
/// per offline-to-online edge.
///
/// Starts in the offline state; the first `report` establishes reality, so a
/// device that boots with connectivity sees one edge immediately.
#[derive(Clone, Default)]
pub struct ConnectivityObserver {
    state: Arc<Mutex<ObserverState>>,
}

impl ConnectivityObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ObserverState> {
        self.state.lock().expect("connectivity observer lock poisoned")
    }

    /// Combined online state: connected and the internet is reachable.
    pub fn is_online(&self) -> bool {
        let state = self.lock();
        state.is_connected && state.is_internet_reachable
    }

    /// Current raw `(is_connected, is_internet_reachable)` pair.
    pub fn snapshot(&self) -> (bool, bool) {
        let state = self.lock();
        (state.is_connected, state.is_internet_reachable)
    }

    /// Feed one raw platform notification into the observer.
    ///
    /// Callbacks run after the internal lock is released, so a subscriber
    /// can re-enter the observer. A panicking subscriber is isolated and
    /// cannot affect the others or the observer's state.
    pub fn report(&self, is_connected: bool, is_internet_reachable: bool) {
        let to_fire = {
            let mut state = self.lock();
            state.is_connected = is_connected;
            state.is_internet_reachable = is_internet_reachable;
            let now_online = is_connected && is_internet_reachable;
            let crossed = now_online && !state.was_online;
            state.was_online = now_online;
            if crossed {
                state
                    .callbacks
                    .iter()
                    .map(|(_, callback)| Arc::clone(callback))
                    .collect::<Vec<_>>()
            } else {
                Vec::new()
            }
        };

        if to_fire.is_empty() {
            return;
        }
        debug!(
            "connectivity: offline -> online, notifying {} subscriber(s)",
            to_fire.len()
        );
        for callback in to_fire {
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                warn!("connectivity: online subscriber panicked");
            }
        }
    }

    /// Register a callback for offline-to-online edges.
    ///
    /// The callback stays registered for the lifetime of the returned
    /// subscription handle.
    pub fn on_became_online(
        &self,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> OnlineSubscription {
        let id = {
            let mut state = self.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.callbacks.push((id, Arc::new(callback)));
            id
        };
        OnlineSubscription {
            id,
            state: Arc::downgrade(&self.state),
        }
    }
}

/// Handle for a registered online callback; dropping it unsubscribes.
pub struct OnlineSubscription {
    id: u64,
    state: Weak<Mutex<ObserverState>>,
}

impl OnlineSubscription {
    /// Remove the callback now. Removing one that is already gone is a
    /// no-op.
    pub fn unsubscribe(self) {}
}

impl Drop for OnlineSubscription {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            if let Ok(mut state) = state.lock() {
                state.callbacks.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

//! Permission state types and probers.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

/// Authorization state of the positioning capability.
///
/// String form matches the platform contract: `unknown`, `prompt`,
/// `granted`, `denied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PermissionState {
    /// State could not be determined.
    #[default]
    Unknown,
    /// The platform will ask the user on the next sensor request.
    Prompt,
    /// Access granted.
    Granted,
    /// Access refused.
    Denied,
}

impl PermissionState {
    /// Platform string for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Prompt => "prompt",
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }
}

impl std::fmt::Display for PermissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionState {
    type Err = std::convert::Infallible;

    /// Never fails: unrecognized strings map to `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "prompt" => Self::Prompt,
            "granted" => Self::Granted,
            "denied" => Self::Denied,
            _ => Self::Unknown,
        })
    }
}

/// Listener callback invoked on each state transition.
pub type PermissionCallback = Box<dyn Fn(PermissionState) + Send + Sync>;

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Read-only view of the positioning permission.
pub trait PermissionProber: Send + Sync {
    /// Current cached state. Never fails.
    fn current_state(&self) -> PermissionState;

    /// Register a listener for state transitions.
    fn on_change(&self, callback: PermissionCallback) -> ListenerId;

    /// Remove a listener. Returns false if it was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// Process-wide permission cache updated by the platform.
///
/// Holds the state in a `watch` channel so async consumers can await
/// transitions, and keeps plain callbacks for synchronous observers.
pub struct SharedPermission {
    state_tx: watch::Sender<PermissionState>,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn Fn(PermissionState) + Send + Sync>)>>,
    next_id: AtomicU64,
}

impl SharedPermission {
    /// Create with an initial state.
    pub fn new(initial: PermissionState) -> Self {
        let (state_tx, _) = watch::channel(initial);
        Self {
            state_tx,
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create from the result of a platform query.
    ///
    /// A failed query (capability absent, blocked by the platform) yields
    /// `Unknown`.
    pub fn from_query<E: std::fmt::Display>(result: Result<PermissionState, E>) -> Self {
        let state = result.unwrap_or_else(|e| {
            debug!(error = %e, "Permission query failed, assuming unknown");
            PermissionState::Unknown
        });
        Self::new(state)
    }

    /// Record a platform-reported state.
    ///
    /// Listeners are only notified when the state actually changes.
    pub fn set(&self, state: PermissionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });

        if changed {
            debug!(state = %state, "Permission state changed");
            // Invoked without the lock so callbacks may use the prober.
            let callbacks: Vec<_> = self
                .listeners
                .lock()
                .iter()
                .map(|(_, callback)| Arc::clone(callback))
                .collect();
            for callback in callbacks {
                callback(state);
            }
        }
    }

    /// Number of registered callbacks.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Subscribe to transitions as a `watch` receiver.
    pub fn subscribe(&self) -> watch::Receiver<PermissionState> {
        self.state_tx.subscribe()
    }
}

impl Default for SharedPermission {
    fn default() -> Self {
        Self::new(PermissionState::Unknown)
    }
}

impl PermissionProber for SharedPermission {
    fn current_state(&self) -> PermissionState {
        *self.state_tx.borrow()
    }

    fn on_change(&self, callback: PermissionCallback) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::from(callback)));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

/// Permission that never changes.
///
/// For sources without a permission model (gpsd) or states fixed on the
/// command line.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission(pub PermissionState);

impl PermissionProber for StaticPermission {
    fn current_state(&self) -> PermissionState {
        self.0
    }

    fn on_change(&self, _callback: PermissionCallback) -> ListenerId {
        ListenerId(0)
    }

    fn remove_listener(&self, _id: ListenerId) -> bool {
        false
    }
}

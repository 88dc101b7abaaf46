//! Coordinator lifecycle state and stop signal

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::core::CoordinatorError;

/// Observable lifecycle state of a Coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, not yet started
    Idle,
    /// Dispatch loop active
    Running,
    /// Stop requested, tasks winding down
    Stopping,
    /// Terminal
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// State and stop signal behind a single guard
///
/// The stop token is only cancelled while the state lock is held, so the
/// transition to `Stopping` and the signal happen together, exactly once.
pub(crate) struct Lifecycle {
    state: Mutex<LifecycleState>,
    stop: CancellationToken,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState::Idle),
            stop: CancellationToken::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LifecycleState> {
        // A poisoned guard still holds a valid state value
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn state(&self) -> LifecycleState {
        *self.lock()
    }

    /// Idle -> Running
    pub(crate) fn begin(&self) -> Result<(), CoordinatorError> {
        let mut state = self.lock();
        debug!(state = %*state, "Lifecycle::begin: called");
        if *state != LifecycleState::Idle {
            return Err(CoordinatorError::NotIdle { state: *state });
        }
        *state = LifecycleState::Running;
        Ok(())
    }

    /// Running -> Stopping, or Idle -> Stopped; returns true for the call that transitioned
    pub(crate) fn request_stop(&self) -> bool {
        let mut state = self.lock();
        debug!(state = %*state, "Lifecycle::request_stop: called");
        let next = match *state {
            LifecycleState::Running => LifecycleState::Stopping,
            LifecycleState::Idle => LifecycleState::Stopped,
            LifecycleState::Stopping | LifecycleState::Stopped => return false,
        };
        *state = next;
        self.stop.cancel();
        true
    }

    /// Mark the run as finished
    pub(crate) fn finish(&self) {
        let mut state = self.lock();
        debug!(state = %*state, "Lifecycle::finish: called");
        *state = LifecycleState::Stopped;
        self.stop.cancel();
    }

    /// Token fired by the first stop request
    pub(crate) fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }
}

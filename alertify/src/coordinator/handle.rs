//! CoordinatorHandle - producer interface to the Coordinator

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::lifecycle::{Lifecycle, LifecycleState};
use super::messages::{Action, Command, CommandError, CommandResult};
use super::metrics::{CoordinatorMetrics, DispatchCounters};

/// Why a command could not be handed to (or answered by) the Coordinator
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Coordinator is stopping")]
    Stopped,

    #[error("Coordinator channel closed")]
    Closed,

    #[error("Coordinator dropped the command without responding")]
    NoResponse,
}

/// Failure of a submit-and-wait request
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Cloneable handle shared by every producer
///
/// This is the command sink handed to monitors and the HTTP adapter, and the
/// place where the owner requests shutdown.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
    lifecycle: Arc<Lifecycle>,
    counters: Arc<DispatchCounters>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>, lifecycle: Arc<Lifecycle>, counters: Arc<DispatchCounters>) -> Self {
        Self {
            tx,
            lifecycle,
            counters,
        }
    }

    /// Hand a command to the dispatcher and return its response receiver
    ///
    /// The send races the stop signal, so a producer never hangs on a
    /// coordinator that has already stopped.
    pub async fn submit(&self, action: Action) -> Result<oneshot::Receiver<CommandResult>, SubmitError> {
        let (command, reply_rx) = Command::new(action);
        let command_id = command.id.clone();
        debug!(%command_id, "CoordinatorHandle::submit: called");

        let stop = self.lifecycle.stop_token();
        tokio::select! {
            biased;
            _ = stop.cancelled() => {
                debug!(%command_id, "CoordinatorHandle::submit: coordinator stopping, command not sent");
                Err(SubmitError::Stopped)
            }
            sent = self.tx.send(command) => {
                sent.map_err(|_| SubmitError::Closed)?;
                debug!(%command_id, "CoordinatorHandle::submit: sent");
                Ok(reply_rx)
            }
        }
    }

    /// Submit a command and wait for its response
    pub async fn request(&self, action: Action) -> Result<(), RequestError> {
        debug!(%action, "CoordinatorHandle::request: called");
        let reply_rx = self.submit(action).await?;
        let result = reply_rx.await.map_err(|_| SubmitError::NoResponse)?;
        Ok(result?)
    }

    /// Request shutdown; only the first call has an effect
    ///
    /// Returns true for the call that performed the transition.
    pub fn stop(&self) -> bool {
        let transitioned = self.lifecycle.request_stop();
        debug!(transitioned, "CoordinatorHandle::stop: called");
        transitioned
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Resolves once stop has been requested
    pub async fn stopped(&self) {
        self.lifecycle.stop_token().cancelled_owned().await
    }

    /// Dispatch counters so far
    pub fn metrics(&self) -> CoordinatorMetrics {
        self.counters.snapshot()
    }
}

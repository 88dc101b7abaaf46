//! Bounded-wait command requests

use std::time::Duration;

use tracing::{debug, warn};

use crate::coordinator::{Action, CommandError, CoordinatorHandle, RequestError};

/// What happened to a bounded-wait request
#[derive(Debug)]
pub enum RequestOutcome {
    /// The coordinator executed the command
    Accepted,

    /// The coordinator answered with an error
    Failed(CommandError),

    /// No answer within the budget; the command may still run later
    TimedOut,

    /// The coordinator is stopped and will never answer
    Unavailable,
}

/// Submits commands and waits for their responses under a fixed budget
///
/// The budget covers both handing the command over and waiting for the
/// answer. Giving up never cancels a command that was already handed over.
#[derive(Clone)]
pub struct Requester {
    handle: CoordinatorHandle,
    timeout: Duration,
}

impl Requester {
    pub fn new(handle: CoordinatorHandle, timeout: Duration) -> Self {
        debug!(?timeout, "Requester::new: called");
        Self { handle, timeout }
    }

    pub async fn request(&self, action: Action) -> RequestOutcome {
        debug!(%action, "Requester::request: called");
        match tokio::time::timeout(self.timeout, self.handle.request(action)).await {
            Ok(Ok(())) => RequestOutcome::Accepted,
            Ok(Err(RequestError::Command(e))) => RequestOutcome::Failed(e),
            Ok(Err(RequestError::Submit(e))) => {
                warn!(error = %e, "Coordinator unavailable");
                RequestOutcome::Unavailable
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "Request timed out");
                RequestOutcome::TimedOut
            }
        }
    }
}

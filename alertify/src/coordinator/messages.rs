//! Message types for the Coordinator

use std::fmt;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::playback::BackendError;

/// Result delivered on a command's response channel
pub type CommandResult = Result<(), CommandError>;

/// Request-level errors, scoped to a single command
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unsupported command: {kind}")]
    Unsupported { kind: String },

    #[error("Playback failed: {0}")]
    Backend(#[from] BackendError),
}

/// Playback action requested by a producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Start playback; `None` plays the coordinator's default track
    Alert {
        track_ref: Option<String>,
    },

    /// Pause playback
    Silence,

    /// A kind the dispatcher does not understand
    Unsupported { kind: String },
}

impl Action {
    /// Alert with the default track
    pub fn alert() -> Self {
        Self::Alert { track_ref: None }
    }

    /// Alert with an explicit track reference
    pub fn alert_track(track_ref: impl Into<String>) -> Self {
        Self::Alert {
            track_ref: Some(track_ref.into()),
        }
    }

    /// Build an action from its wire name and optional payload
    ///
    /// Unknown names become [`Action::Unsupported`] so the dispatcher can
    /// answer them with an error instead of rejecting them up front.
    pub fn from_kind(kind: &str, payload: Option<String>) -> Self {
        debug!(%kind, ?payload, "Action::from_kind: called");
        match kind.to_lowercase().as_str() {
            "alert" => Self::Alert { track_ref: payload },
            "silence" => Self::Silence,
            _ => Self::Unsupported { kind: kind.to_string() },
        }
    }

    /// Wire name of this action
    pub fn kind(&self) -> &str {
        match self {
            Self::Alert { .. } => "alert",
            Self::Silence => "silence",
            Self::Unsupported { kind } => kind,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alert { track_ref: Some(track) } => write!(f, "alert({})", track),
            _ => write!(f, "{}", self.kind()),
        }
    }
}

/// A single playback request with its private, write-once response channel
#[derive(Debug)]
pub struct Command {
    /// Correlation id for logs
    pub id: String,
    pub action: Action,
    reply_tx: oneshot::Sender<CommandResult>,
}

impl Command {
    /// Create a command and the receiver its creator waits on
    pub fn new(action: Action) -> (Self, oneshot::Receiver<CommandResult>) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = Self {
            id: Uuid::now_v7().to_string(),
            action,
            reply_tx,
        };
        debug!(command_id = %command.id, action = %command.action, "Command::new: created");
        (command, reply_rx)
    }

    /// Deliver the result, consuming the command
    ///
    /// Returns false if the creator already stopped waiting. The write never blocks.
    pub fn respond(self, result: CommandResult) -> bool {
        let delivered = self.reply_tx.send(result).is_ok();
        if !delivered {
            debug!(command_id = %self.id, "Command::respond: receiver dropped, response discarded");
        }
        delivered
    }
}

//! Monitors: long-running producers that turn outside activity into commands
//!
//! A monitor runs on its own task, owned by the Coordinator, and submits
//! commands through the [`CoordinatorHandle`] it is given.

mod chat;
mod source;

use async_trait::async_trait;
use thiserror::Error;

use crate::coordinator::CoordinatorHandle;

pub use chat::ChatMonitor;
pub use source::{ChannelSource, ChatEvent, EventSource, LineSource};

/// Fatal monitor errors; any of these ends the Coordinator's run
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Event stream closed")]
    StreamClosed,

    #[error("Event stream error: {0}")]
    EventStream(String),

    #[error("Invalid chat credentials")]
    InvalidAuth,

    #[error("Monitor already running")]
    AlreadyRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A long-running source of commands
#[async_trait]
pub trait Monitor: Send + Sync {
    /// Watch for activity and submit commands to `sink`
    ///
    /// Returns `Ok(())` after `request_stop`, or an error when the monitor
    /// cannot continue.
    async fn run(&self, sink: CoordinatorHandle) -> Result<(), MonitorError>;

    /// Ask a running monitor to return; safe to call more than once
    fn request_stop(&self);

    /// Name used in logs and errors
    fn describe(&self) -> String;
}

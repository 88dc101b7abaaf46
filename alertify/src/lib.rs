//! Alertify - alert bot that plays a song on a shared speaker
//!
//! Alerts arrive from several producers at once (an HTTP API, chat monitors)
//! but the speaker can only do one thing at a time. The [`coordinator`]
//! serializes every playback command through a single dispatch loop.
//!
//! # Modules
//!
//! - [`coordinator`] - Command channel, dispatch loop, and lifecycle
//! - [`playback`] - Playback backend trait and Spotify implementation
//! - [`monitor`] - Monitor trait, chat monitor, and event sources
//! - [`api`] - HTTP routes with bounded-wait requests
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod api;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod monitor;
pub mod playback;

// Re-export commonly used types
pub use api::{RequestOutcome, Requester};
pub use config::{ApiConfig, BindAddr, ChatConfig, Config, PlaybackConfig};
pub use coordinator::{
    Action, Command, CommandError, CommandResult, Coordinator, CoordinatorConfig, CoordinatorError, CoordinatorHandle,
    CoordinatorMetrics, LifecycleState, RequestError, SubmitError,
};
pub use monitor::{ChannelSource, ChatEvent, ChatMonitor, EventSource, LineSource, Monitor, MonitorError};
pub use playback::{BackendError, Device, PlaybackBackend, SpotifyBackend};

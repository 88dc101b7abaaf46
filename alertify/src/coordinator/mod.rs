//! Coordinator: the single consumer of playback commands
//!
//! Producers (the HTTP adapter, chat monitors) hand `Command`s to the
//! Coordinator through a `CoordinatorHandle`. The dispatch loop executes them
//! one at a time against the playback backend and answers each on its own
//! one-shot response channel.

mod config;
mod core;
mod handle;
mod lifecycle;
mod messages;
mod metrics;

pub use config::{CoordinatorConfig, DEFAULT_TRACK};
pub use core::{Coordinator, CoordinatorError};
pub use handle::{CoordinatorHandle, RequestError, SubmitError};
pub use lifecycle::LifecycleState;
pub use messages::{Action, Command, CommandError, CommandResult};
pub use metrics::CoordinatorMetrics;

//! Main Coordinator task implementation

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::CoordinatorConfig;
use super::handle::CoordinatorHandle;
use super::lifecycle::{Lifecycle, LifecycleState};
use super::messages::{Action, Command, CommandError, CommandResult};
use super::metrics::{Counter, DispatchCounters};
use crate::monitor::{Monitor, MonitorError};
use crate::playback::PlaybackBackend;

/// Errors that end a Coordinator run
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Coordinator cannot start while {state}")]
    NotIdle { state: LifecycleState },

    #[error("{monitor} failed: {source}")]
    Monitor {
        monitor: String,
        #[source]
        source: MonitorError,
    },

    #[error("{component} task panicked")]
    TaskPanicked { component: String },
}

/// How a spawned task finished
enum TaskExit {
    Dispatcher,
    Monitor {
        name: String,
        result: Result<(), MonitorError>,
    },
}

/// What the supervisor should do about a finished task
enum Outcome {
    Graceful,
    Continue,
    Fatal(CoordinatorError),
}

/// Single consumer of playback commands
///
/// Owns the command channel and the playback backend. Monitors are
/// registered before `start`, which consumes the Coordinator.
pub struct Coordinator {
    config: CoordinatorConfig,
    backend: Arc<dyn PlaybackBackend>,
    monitors: Vec<Arc<dyn Monitor>>,
    tx: mpsc::Sender<Command>,
    rx: mpsc::Receiver<Command>,
    lifecycle: Arc<Lifecycle>,
    counters: Arc<DispatchCounters>,
}

impl Coordinator {
    /// Create a new Coordinator with the given configuration and backend
    pub fn new(config: CoordinatorConfig, backend: Arc<dyn PlaybackBackend>) -> Self {
        debug!(?config, "Coordinator::new: called");
        let (tx, rx) = mpsc::channel(config.channel_buffer.max(1));
        Self {
            config,
            backend,
            monitors: Vec::new(),
            tx,
            rx,
            lifecycle: Arc::new(Lifecycle::new()),
            counters: Arc::new(DispatchCounters::default()),
        }
    }

    /// Register a monitor; monitors run in registration order
    pub fn register_monitor(&mut self, monitor: Arc<dyn Monitor>) {
        info!(monitor = %monitor.describe(), "Registering monitor");
        self.monitors.push(monitor);
    }

    /// Names of the registered monitors
    pub fn monitors(&self) -> Vec<String> {
        self.monitors.iter().map(|m| m.describe()).collect()
    }

    /// Get a handle for producers and for stopping the run
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.tx.clone(), Arc::clone(&self.lifecycle), Arc::clone(&self.counters))
    }

    /// Run until stopped or until a monitor fails
    pub async fn start(self) -> Result<(), CoordinatorError> {
        self.start_until(std::future::pending()).await
    }

    /// Run until stopped, until a monitor fails, or until `shutdown` resolves
    ///
    /// Whatever ends the run, the dispatch loop is stopped first, then every
    /// monitor, and all spawned tasks are awaited before returning.
    pub async fn start_until<F>(self, shutdown: F) -> Result<(), CoordinatorError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            config,
            backend,
            monitors,
            tx,
            rx,
            lifecycle,
            counters,
        } = self;

        lifecycle.begin()?;
        info!(monitors = monitors.len(), default_track = %config.default_track, "Coordinator started");

        let handle = CoordinatorHandle::new(tx, Arc::clone(&lifecycle), Arc::clone(&counters));
        let mut tasks: JoinSet<TaskExit> = JoinSet::new();
        let mut components: HashMap<Id, String> = HashMap::new();

        let dispatcher = Dispatcher {
            backend,
            default_track: config.default_track,
            counters: Arc::clone(&counters),
            stop: lifecycle.stop_token(),
        };
        let task = tasks.spawn(async move {
            dispatcher.run(rx).await;
            TaskExit::Dispatcher
        });
        components.insert(task.id(), "dispatch loop".to_string());

        for monitor in &monitors {
            let monitor = Arc::clone(monitor);
            let sink = handle.clone();
            let name = monitor.describe();
            let task_name = name.clone();
            let task = tasks.spawn(async move {
                info!(monitor = %task_name, "Starting monitor");
                let result = monitor.run(sink).await;
                TaskExit::Monitor { name: task_name, result }
            });
            components.insert(task.id(), name);
        }

        let mut first_error = None;
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                joined = tasks.join_next_with_id() => {
                    let Some(joined) = joined else { break };
                    match classify(joined, &components) {
                        Outcome::Graceful => break,
                        Outcome::Continue => continue,
                        Outcome::Fatal(err) => {
                            error!(error = %err, "Fatal error, shutting down");
                            first_error = Some(err);
                            break;
                        }
                    }
                }
            }
        }

        info!("Message listener shutting down");
        handle.stop();

        for monitor in &monitors {
            info!(monitor = %monitor.describe(), "Stopping monitor");
            monitor.request_stop();
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            if let Outcome::Fatal(err) = classify(joined, &components) {
                if first_error.is_none() {
                    first_error = Some(err);
                } else {
                    warn!(error = %err, "Additional error during shutdown");
                }
            }
        }

        lifecycle.finish();
        let metrics = counters.snapshot();
        info!(
            received = metrics.commands_received,
            alerts = metrics.alerts,
            silences = metrics.silences,
            backend_failures = metrics.backend_failures,
            "Coordinator stopped"
        );

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn classify(joined: Result<(Id, TaskExit), JoinError>, components: &HashMap<Id, String>) -> Outcome {
    match joined {
        Ok((_, TaskExit::Dispatcher)) => {
            debug!("classify: dispatch loop exited");
            Outcome::Graceful
        }
        Ok((_, TaskExit::Monitor { name, result: Ok(()) })) => {
            info!(monitor = %name, "Monitor stopped");
            Outcome::Continue
        }
        Ok((_, TaskExit::Monitor { name, result: Err(source) })) => {
            warn!(monitor = %name, error = %source, "Monitor failed");
            Outcome::Fatal(CoordinatorError::Monitor { monitor: name, source })
        }
        Err(join_err) => {
            let component = components
                .get(&join_err.id())
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            if join_err.is_cancelled() {
                warn!(%component, "Task cancelled");
                Outcome::Continue
            } else {
                Outcome::Fatal(CoordinatorError::TaskPanicked { component })
            }
        }
    }
}

/// The dispatch loop: one command at a time against the backend
struct Dispatcher {
    backend: Arc<dyn PlaybackBackend>,
    default_track: String,
    counters: Arc<DispatchCounters>,
    stop: CancellationToken,
}

impl Dispatcher {
    async fn run(self, mut rx: mpsc::Receiver<Command>) {
        info!("Dispatch loop started");

        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => {
                    info!("Stopping message listener");
                    break;
                }
                received = rx.recv() => match received {
                    Some(command) => self.dispatch(command).await,
                    None => {
                        info!("Command channel closed");
                        break;
                    }
                }
            }
        }

        // Queued commands are dropped unanswered; their senders see a closed channel
        rx.close();
        let mut discarded = 0usize;
        while rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            warn!(discarded, "Discarded queued commands at shutdown");
        }
        info!("Dispatch loop stopped");
    }

    async fn dispatch(&self, command: Command) {
        self.counters.incr(Counter::Received);
        info!(command_id = %command.id, action = %command.action, "Received command");

        let result = self.execute(&command.action).await;
        match &result {
            Ok(()) => debug!(command_id = %command.id, "dispatch: command succeeded"),
            Err(e) => warn!(command_id = %command.id, error = %e, "Command failed"),
        }

        if !command.respond(result) {
            self.counters.incr(Counter::AbandonedResponse);
        }
    }

    async fn execute(&self, action: &Action) -> CommandResult {
        match action {
            Action::Alert { track_ref } => {
                self.counters.incr(Counter::Alert);
                let track = track_ref.as_deref().unwrap_or(&self.default_track);
                self.backend.play(track).await.map_err(|e| {
                    self.counters.incr(Counter::BackendFailure);
                    CommandError::from(e)
                })
            }
            Action::Silence => {
                self.counters.incr(Counter::Silence);
                self.backend.pause().await.map_err(|e| {
                    self.counters.incr(Counter::BackendFailure);
                    CommandError::from(e)
                })
            }
            Action::Unsupported { kind } => {
                self.counters.incr(Counter::Unsupported);
                Err(CommandError::Unsupported { kind: kind.clone() })
            }
        }
    }
}

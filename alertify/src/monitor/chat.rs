//! Chat monitor: raises an alert when a watched user posts a matching message

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::source::{ChatEvent, EventSource};
use super::{Monitor, MonitorError};
use crate::config::ChatConfig;
use crate::coordinator::{Action, CoordinatorHandle};

/// Watches a chat event stream for alert messages
pub struct ChatMonitor {
    user: String,
    channel: Option<String>,
    pattern: Regex,
    source: Mutex<Option<Box<dyn EventSource>>>,
    stop: CancellationToken,
}

impl ChatMonitor {
    /// Build a monitor over `source`
    ///
    /// An empty `channel` in the config matches messages from any channel.
    pub fn new(config: &ChatConfig, source: Box<dyn EventSource>) -> Result<Self, regex::Error> {
        debug!(?config, "ChatMonitor::new: called");
        let pattern = Regex::new(&config.pattern)?;
        let channel = Some(config.channel.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Ok(Self {
            user: config.user.clone(),
            channel,
            pattern,
            source: Mutex::new(Some(source)),
            stop: CancellationToken::new(),
        })
    }

    /// Whether a message should raise an alert
    pub fn matches(&self, user: &str, channel: &str, text: &str) -> bool {
        if !user.eq_ignore_ascii_case(&self.user) {
            return false;
        }
        if self.channel.as_deref().is_some_and(|watched| watched != channel) {
            return false;
        }
        self.pattern.is_match(text)
    }

    async fn handle_event(&self, event: ChatEvent, sink: &CoordinatorHandle) -> Result<(), MonitorError> {
        match event {
            ChatEvent::Message { user, channel, text } => {
                if !self.matches(&user, &channel, &text) {
                    debug!(%user, %channel, "ChatMonitor::handle_event: no match");
                    return Ok(());
                }
                info!(%user, %channel, "Chat alert message match detected");
                if let Err(e) = sink.request(Action::alert()).await {
                    warn!(error = %e, "Could not play alert");
                }
                Ok(())
            }
            ChatEvent::Latency { millis } => {
                info!(latency_ms = millis, "Current chat latency");
                Ok(())
            }
            ChatEvent::Error { message } => Err(MonitorError::EventStream(message)),
            ChatEvent::InvalidAuth => Err(MonitorError::InvalidAuth),
        }
    }
}

#[async_trait]
impl Monitor for ChatMonitor {
    async fn run(&self, sink: CoordinatorHandle) -> Result<(), MonitorError> {
        let mut source = self.source.lock().await.take().ok_or(MonitorError::AlreadyRunning)?;
        info!(user = %self.user, channel = ?self.channel, pattern = %self.pattern, "Chat monitor watching");

        loop {
            let event = tokio::select! {
                biased;
                _ = self.stop.cancelled() => None,
                event = source.next_event() => Some(event),
            };

            let Some(event) = event else {
                source.close().await;
                info!("Chat monitor disconnected");
                return Ok(());
            };

            let handled = match event {
                Ok(event) => self.handle_event(event, &sink).await,
                Err(e) => Err(e),
            };
            if let Err(e) = handled {
                source.close().await;
                return Err(e);
            }
        }
    }

    fn request_stop(&self) {
        debug!("ChatMonitor::request_stop: called");
        self.stop.cancel();
    }

    fn describe(&self) -> String {
        format!("chat monitor ({})", self.user)
    }
}

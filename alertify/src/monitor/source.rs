//! Chat event sources
//!
//! Events are JSON objects tagged by `"type"`, one per line on the wire:
//!
//! ```text
//! {"type":"message","user":"production","channel":"devops-production","text":"alert: db down"}
//! {"type":"latency","millis":42}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::MonitorError;

/// An event from a chat connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Someone said something
    Message {
        user: String,
        #[serde(default)]
        channel: String,
        text: String,
    },

    /// Connection latency report
    Latency { millis: u64 },

    /// The connection failed
    Error { message: String },

    /// The connection was rejected
    InvalidAuth,
}

/// A long-lived stream of chat events
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next event
    ///
    /// Must be cancel-safe: the chat monitor races it against its stop signal.
    async fn next_event(&mut self) -> Result<ChatEvent, MonitorError>;

    /// Disconnect; later calls to `next_event` fail with `StreamClosed`
    async fn close(&mut self);
}

/// Newline-delimited JSON events from any async reader
pub struct LineSource<R> {
    lines: Lines<R>,
    closed: bool,
}

impl<R> LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            closed: false,
        }
    }
}

impl LineSource<BufReader<tokio::fs::File>> {
    /// Events read from a file or named pipe
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let file = tokio::fs::File::open(path.as_ref()).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

#[async_trait]
impl<R> EventSource for LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_event(&mut self) -> Result<ChatEvent, MonitorError> {
        loop {
            if self.closed {
                return Err(MonitorError::StreamClosed);
            }

            let Some(line) = self.lines.next_line().await? else {
                debug!("LineSource::next_event: end of stream");
                self.closed = true;
                return Err(MonitorError::StreamClosed);
            };

            if let Some(event) = parse_line(&line) {
                return Ok(event);
            }
        }
    }

    async fn close(&mut self) {
        debug!("LineSource::close: called");
        self.closed = true;
    }
}

/// Parse one line of the wire format; blank and malformed lines yield nothing
fn parse_line(line: &str) -> Option<ChatEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, %line, "Skipping malformed chat event");
            None
        }
    }
}

/// Events delivered over an in-process channel
pub struct ChannelSource {
    rx: mpsc::Receiver<ChatEvent>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<ChatEvent>) -> Self {
        Self { rx }
    }

    /// A source plus the sender that feeds it
    pub fn channel(buffer: usize) -> (mpsc::Sender<ChatEvent>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }

    /// Events piped in on stdin
    pub fn stdin() -> Self {
        Self::spawn_reader(std::io::BufReader::new(std::io::stdin()), 1)
    }

    /// Read newline-delimited JSON events from a blocking reader
    ///
    /// The reader runs on its own OS thread, so a read that never returns
    /// can't hold up runtime shutdown. The thread exits at end of input or
    /// once the source is closed or dropped; end of input reaches the
    /// source as `StreamClosed`.
    pub fn spawn_reader<R>(reader: R, buffer: usize) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, source) = Self::channel(buffer);

        std::thread::spawn(move || {
            for line in reader.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "Failed to read chat events");
                        break;
                    }
                };

                let Some(event) = parse_line(&line) else {
                    continue;
                };
                if tx.blocking_send(event).is_err() {
                    debug!("ChannelSource reader: source closed");
                    return;
                }
            }
            debug!("ChannelSource reader: end of stream");
        });

        source
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn next_event(&mut self) -> Result<ChatEvent, MonitorError> {
        self.rx.recv().await.ok_or(MonitorError::StreamClosed)
    }

    async fn close(&mut self) {
        debug!("ChannelSource::close: called");
        self.rx.close();
    }
}

//! Playback backend abstraction
//!
//! The Coordinator's dispatch loop is the only caller of a backend. The
//! Spotify Web API adapter lives in [`spotify`]; tests plug in stubs.

mod spotify;

use async_trait::async_trait;
use thiserror::Error;

pub use spotify::{Device, SpotifyBackend};

/// Errors raised by a playback backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("No active playback device found")]
    NoActiveDevice,

    #[error("Authentication error: {0}")]
    Auth(String),
}

impl BackendError {
    /// HTTP status of an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Something that can start and pause audio playback
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    /// Start playing `track_ref` on the selected device
    async fn play(&self, track_ref: &str) -> Result<(), BackendError>;

    /// Pause playback on the selected device
    async fn pause(&self) -> Result<(), BackendError>;
}

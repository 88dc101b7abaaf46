//! Spotify Web API playback backend
//!
//! Talks to the player endpoints with a bearer token. Obtaining the token
//! (the OAuth authorization flow) happens outside this process.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{BackendError, PlaybackBackend};
use crate::config::PlaybackConfig;

/// Name logged when a track lookup fails
const UNKNOWN_TRACK: &str = "Unknown";

/// A Spotify Connect device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_restricted: bool,
}

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
struct TrackResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Spotify Web API client implementing [`PlaybackBackend`]
pub struct SpotifyBackend {
    http: Client,
    base_url: String,
    token: String,
    device: RwLock<Option<Device>>,
}

impl SpotifyBackend {
    /// Create a backend from configuration, reading the token from its env var
    pub fn from_config(config: &PlaybackConfig) -> Result<Self, BackendError> {
        debug!(?config, "SpotifyBackend::from_config: called");
        let token = config.token().map_err(|e| BackendError::Auth(e.to_string()))?;
        Self::new(config, token)
    }

    /// Create a backend with an explicit token
    pub fn new(config: &PlaybackConfig, token: impl Into<String>) -> Result<Self, BackendError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            device: RwLock::new(None),
        })
    }

    /// List the devices visible to this account
    pub async fn devices(&self) -> Result<Vec<Device>, BackendError> {
        debug!("SpotifyBackend::devices: called");
        let url = format!("{}/v1/me/player/devices", self.base_url);
        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
        let response = check_status(response).await?;
        let body: DevicesResponse = response.json().await?;
        debug!(count = body.devices.len(), "SpotifyBackend::devices: fetched");
        Ok(body.devices)
    }

    /// Pick the device playback is sent to
    ///
    /// Matches by id or by name among unrestricted devices. Without a match
    /// the first unrestricted device is used.
    pub async fn select_device(&self, device_id: Option<&str>, device_name: Option<&str>) -> Result<Device, BackendError> {
        debug!(?device_id, ?device_name, "SpotifyBackend::select_device: called");
        let devices = self.devices().await?;
        let device = choose_device(&devices, device_id, device_name)
            .cloned()
            .ok_or(BackendError::NoActiveDevice)?;

        info!(
            device_id = device.id.as_deref().unwrap_or(""),
            device_name = %device.name,
            "Selected playback device"
        );
        *self.device.write().await = Some(device.clone());
        Ok(device)
    }

    /// Currently selected device
    pub async fn device(&self) -> Option<Device> {
        self.device.read().await.clone()
    }

    /// Best-effort track name for logging
    async fn track_name(&self, track_ref: &str) -> String {
        let parts: Vec<&str> = track_ref.split(':').collect();
        let [_, _, track_id] = parts.as_slice() else {
            warn!(%track_ref, "Could not parse track id");
            return UNKNOWN_TRACK.to_string();
        };

        let url = format!("{}/v1/tracks/{}", self.base_url, track_id);
        let lookup = async {
            let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
            let track: TrackResponse = check_status(response).await?.json().await?;
            Ok::<_, BackendError>(track.name)
        };

        match lookup.await {
            Ok(name) => name,
            Err(e) => {
                warn!(%track_ref, error = %e, "Failed to get track name");
                UNKNOWN_TRACK.to_string()
            }
        }
    }

    /// Send a player command, targeting the selected device if there is one
    async fn player_command(&self, path: &str, body: Option<serde_json::Value>) -> Result<(), BackendError> {
        let url = format!("{}/v1/me/player/{}", self.base_url, path);
        let mut request = self.http.put(&url).bearer_auth(&self.token);

        if let Some(id) = self.device().await.and_then(|d| d.id) {
            request = request.query(&[("device_id", id)]);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl PlaybackBackend for SpotifyBackend {
    async fn play(&self, track_ref: &str) -> Result<(), BackendError> {
        let track_name = self.track_name(track_ref).await;
        let device = self.device().await;
        info!(
            track = %track_name,
            %track_ref,
            device = device.as_ref().map(|d| d.name.as_str()).unwrap_or("active"),
            "Attempting to play"
        );

        self.player_command("play", Some(serde_json::json!({ "uris": [track_ref] })))
            .await
    }

    async fn pause(&self) -> Result<(), BackendError> {
        let device = self.device().await;
        info!(
            device = device.as_ref().map(|d| d.name.as_str()).unwrap_or("active"),
            "Attempting to pause playback"
        );

        self.player_command("pause", None).await
    }
}

fn choose_device<'a>(devices: &'a [Device], device_id: Option<&str>, device_name: Option<&str>) -> Option<&'a Device> {
    let mut usable = devices.iter().filter(|d| !d.is_restricted).peekable();
    let first = usable.peek().copied();

    usable
        .find(|d| {
            let id_match = device_id.is_some() && d.id.as_deref() == device_id;
            let name_match = device_name.is_some_and(|name| d.name == name);
            id_match || name_match
        })
        .or(first)
}

/// Map a non-2xx response to [`BackendError`]
async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    debug!(%status, body = %text, "check_status: API error");
    match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(parsed) if parsed.error.reason.as_deref() == Some("NO_ACTIVE_DEVICE") => Err(BackendError::NoActiveDevice),
        Ok(parsed) => Err(BackendError::Api {
            status: status.as_u16(),
            message: parsed.error.message,
        }),
        Err(_) => Err(BackendError::Api {
            status: status.as_u16(),
            message: text,
        }),
    }
}

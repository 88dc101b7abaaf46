//! Alertify configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::coordinator::CoordinatorConfig;

/// Main Alertify configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level; the `--log-level` flag takes precedence
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Playback backend configuration
    pub playback: PlaybackConfig,

    /// HTTP API configuration
    pub api: ApiConfig,

    /// Coordinator configuration
    pub coordinator: CoordinatorConfig,

    /// Chat monitor configuration
    pub chat: ChatConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        self.playback.token()?;
        self.validate_settings()
    }

    /// Checks that don't depend on the environment
    pub fn validate_settings(&self) -> Result<()> {
        if self.playback.timeout_ms == 0 {
            return Err(eyre::eyre!("playback.timeout-ms must be greater than zero"));
        }
        if self.api.timeout_secs == 0 {
            return Err(eyre::eyre!("api.timeout-secs must be greater than zero"));
        }
        if self.coordinator.channel_buffer == 0 {
            return Err(eyre::eyre!("coordinator.channel-buffer must be greater than zero"));
        }
        self.api.bind_addr()?;
        if self.chat.enabled {
            regex::Regex::new(&self.chat.pattern).context(format!("Invalid chat.pattern: {}", self.chat.pattern))?;
            if self.chat.user.trim().is_empty() {
                return Err(eyre::eyre!("chat.user must be set when the chat monitor is enabled"));
            }
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .alertify.yml
        let local_config = PathBuf::from(".alertify.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/alertify/alertify.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("alertify").join("alertify.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Spotify Web API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the OAuth bearer token
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// Preferred device id
    #[serde(rename = "device-id", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// Preferred device name, used when no id matches
    #[serde(rename = "device-name", skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.spotify.com".to_string(),
            token_env: "SPOTIFY_TOKEN".to_string(),
            device_id: None,
            device_name: None,
            timeout_ms: 10_000,
        }
    }
}

impl PlaybackConfig {
    /// Read the bearer token from the configured environment variable
    pub fn token(&self) -> Result<String> {
        std::env::var(&self.token_env).context(format!(
            "Playback token not found. Set the {} environment variable.",
            self.token_env
        ))
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Listen address
    pub bind: String,

    /// Path prefix the routes are also served under
    pub version: String,

    /// How long a request waits for the coordinator
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            version: "v1".to_string(),
            timeout_secs: 3,
        }
    }
}

impl ApiConfig {
    /// Parse `bind` into a listen address
    pub fn bind_addr(&self) -> Result<BindAddr> {
        self.bind
            .parse()
            .context(format!("Invalid api.bind address: {}", self.bind))
    }
}

/// Where the HTTP API listens
///
/// Written as `host:port`, `tcp://host:port` or `unix:///path/to/socket`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl FromStr for BindAddr {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let (scheme, addr) = s.split_once("://").unwrap_or(("tcp", s));
        match scheme {
            "tcp" => addr.parse().map(Self::Tcp).context(format!("Invalid TCP address: {}", addr)),
            "unix" if addr.is_empty() => Err(eyre::eyre!("Unix socket path is empty")),
            "unix" => Ok(Self::Unix(PathBuf::from(addr))),
            other => Err(eyre::eyre!("Unsupported bind protocol: {}", other)),
        }
    }
}

impl fmt::Display for BindAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{}", addr),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Chat monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Register the chat monitor
    pub enabled: bool,

    /// Sender whose messages can trigger an alert
    pub user: String,

    /// Channel to watch; empty matches every channel
    pub channel: String,

    /// Regex the message text must match
    pub pattern: String,

    /// Newline-delimited JSON event stream; `-` reads stdin
    pub events: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            user: "production".to_string(),
            channel: "devops-production".to_string(),
            pattern: "alert".to_string(),
            events: "-".to_string(),
        }
    }
}

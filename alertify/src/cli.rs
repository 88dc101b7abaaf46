//! CLI command definitions and subcommands

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

/// Alertify - plays an alert song when something needs attention
#[derive(Parser)]
#[command(
    name = "alertify",
    about = "Alert bot that plays a song on Spotify when an alert fires",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "The Spotify bearer token is read from the environment variable named by playback.token-env (default SPOTIFY_TOKEN)"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level: trace, debug, info, warn, error"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run the bot: HTTP API plus any enabled monitors
    Run(RunArgs),

    /// List playback devices visible to the Spotify account
    Devices,
}

/// Overrides for `alertify run`
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Track played when an alert carries none
    #[arg(long)]
    pub song_uri: Option<String>,

    /// Playback device id
    #[arg(long)]
    pub device_id: Option<String>,

    /// Playback device name
    #[arg(long)]
    pub device_name: Option<String>,

    /// HTTP listen address (`host:port`, `tcp://host:port` or `unix:///path`)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Chat user whose messages trigger alerts
    #[arg(long)]
    pub chat_user: Option<String>,

    /// Chat channel to watch
    #[arg(long)]
    pub chat_channel: Option<String>,

    /// Regex a chat message must match
    #[arg(long)]
    pub chat_pattern: Option<String>,

    /// Newline-delimited JSON chat events (`-` for stdin); enables the chat monitor
    #[arg(long)]
    pub chat_events: Option<String>,
}

impl RunArgs {
    /// Apply command-line overrides on top of the loaded config
    pub fn apply(&self, config: &mut Config) {
        if let Some(song_uri) = &self.song_uri {
            config.coordinator.default_track = song_uri.clone();
        }
        if let Some(device_id) = &self.device_id {
            config.playback.device_id = Some(device_id.clone());
        }
        if let Some(device_name) = &self.device_name {
            config.playback.device_name = Some(device_name.clone());
        }
        if let Some(bind) = &self.bind {
            config.api.bind = bind.clone();
        }
        if let Some(user) = &self.chat_user {
            config.chat.user = user.clone();
        }
        if let Some(channel) = &self.chat_channel {
            config.chat.channel = channel.clone();
        }
        if let Some(pattern) = &self.chat_pattern {
            config.chat.pattern = pattern.clone();
        }
        if let Some(events) = &self.chat_events {
            config.chat.events = events.clone();
            config.chat.enabled = true;
        }
    }
}

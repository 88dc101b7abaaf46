//! Alertify - CLI entry point
//!
//! `alertify run` serves the HTTP API and any enabled monitors until SIGINT
//! or SIGTERM; `alertify devices` lists Spotify devices.

use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use eyre::{Context, Result};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use alertify::api::{self, Requester};
use alertify::cli::{Cli, Command, RunArgs};
use alertify::config::Config;
use alertify::coordinator::Coordinator;
use alertify::monitor::{ChannelSource, ChatMonitor, EventSource, LineSource};
use alertify::playback::{PlaybackBackend, SpotifyBackend};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    match cli.command {
        Some(Command::Run(args)) => cmd_run(config, &args).await,
        Some(Command::Devices) => cmd_devices(&config).await,
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Run the bot until a signal arrives or a monitor fails
async fn cmd_run(mut config: Config, args: &RunArgs) -> Result<()> {
    debug!(?args, "cmd_run: called");
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let spotify = SpotifyBackend::from_config(&config.playback).context("Failed to create Spotify client")?;
    let device = spotify
        .select_device(config.playback.device_id.as_deref(), config.playback.device_name.as_deref())
        .await
        .context("Failed to select playback device")?;
    info!(device = %device.name, "Playback device ready");
    let backend: Arc<dyn PlaybackBackend> = Arc::new(spotify);

    let mut coordinator = Coordinator::new(config.coordinator.clone(), backend);
    if config.chat.enabled {
        let source = open_event_source(&config.chat.events).await?;
        let monitor = ChatMonitor::new(&config.chat, source).context("Failed to create chat monitor")?;
        coordinator.register_monitor(Arc::new(monitor));
    }

    let requester = Requester::new(coordinator.handle(), Duration::from_secs(config.api.timeout_secs));
    let app = api::router(requester, &config.api.version);

    let bind_addr = config.api.bind_addr()?;
    let listener = api::bind(&bind_addr).await?;
    info!(bind = %bind_addr, version = %config.api.version, "HTTP API listening");

    // The server drains before the coordinator is stopped, so in-flight
    // requests still get their answers
    let (server_err_tx, mut server_err_rx) = oneshot::channel();
    let server = async move {
        if let Err(e) = listener.serve(app, shutdown_signal()).await {
            error!(error = %e, "HTTP server error");
            let _ = server_err_tx.send(e);
        }
        info!("HTTP API stopped");
    };

    let result = coordinator.start_until(server).await;

    if let Ok(e) = server_err_rx.try_recv() {
        return Err(e).context("HTTP server failed");
    }
    result.context("Alertify stopped with an error")?;

    info!("Shutdown complete");
    Ok(())
}

/// List the devices playback could be sent to
async fn cmd_devices(config: &Config) -> Result<()> {
    let spotify = SpotifyBackend::from_config(&config.playback).context("Failed to create Spotify client")?;
    let devices = spotify.devices().await.context("Failed to list devices")?;

    if devices.is_empty() {
        println!("No playback devices found");
        return Ok(());
    }

    println!("{:<42} {:<28} {:<12} STATUS", "ID", "NAME", "TYPE");
    for device in devices {
        let status = match (device.is_active, device.is_restricted) {
            (_, true) => "restricted",
            (true, false) => "active",
            (false, false) => "",
        };
        println!(
            "{:<42} {:<28} {:<12} {}",
            device.id.as_deref().unwrap_or("-"),
            device.name,
            device.kind,
            status
        );
    }
    Ok(())
}

async fn open_event_source(events: &str) -> Result<Box<dyn EventSource>> {
    if events == "-" {
        info!("Reading chat events from stdin");
        return Ok(Box::new(ChannelSource::stdin()));
    }

    let source = LineSource::open(events)
        .await
        .context(format!("Failed to open chat events from {}", events))?;
    info!(path = %events, "Reading chat events");
    Ok(Box::new(source))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => Some(sigterm),
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                None
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => warn!("SIGINT received"),
            _ = async {
                match sigterm.as_mut() {
                    Some(sigterm) => { sigterm.recv().await; }
                    None => std::future::pending::<()>().await,
                }
            } => warn!("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        warn!("Ctrl+C received");
    }

    info!("Shutting down...");
}

//! HTTP API listeners over TCP or a Unix domain socket

#[cfg(unix)]
use std::path::{Path, PathBuf};

use axum::Router;
use eyre::{Context, Result};
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tracing::debug;
#[cfg(unix)]
use tracing::warn;

use crate::config::BindAddr;

/// A bound listener, ready to serve the API router
#[derive(Debug)]
pub enum ApiListener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener, PathBuf),
}

/// Bind the API listen address
///
/// A leftover socket file from an earlier run is removed before binding.
pub async fn bind(addr: &BindAddr) -> Result<ApiListener> {
    debug!(%addr, "bind: called");
    match addr {
        BindAddr::Tcp(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .context(format!("Failed to bind to {}", addr))?;
            Ok(ApiListener::Tcp(listener))
        }
        #[cfg(unix)]
        BindAddr::Unix(path) => {
            if path.exists() {
                debug!(?path, "bind: removing stale socket");
                std::fs::remove_file(path).context("Failed to remove stale socket")?;
            }
            let listener = UnixListener::bind(path).context(format!("Failed to bind to {}", path.display()))?;
            Ok(ApiListener::Unix(listener, path.clone()))
        }
        #[cfg(not(unix))]
        BindAddr::Unix(path) => Err(eyre::eyre!(
            "Unix sockets are not supported on this platform: {}",
            path.display()
        )),
    }
}

impl ApiListener {
    /// Serve `app` until `shutdown` resolves and in-flight requests drain
    pub async fn serve<F>(self, app: Router, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self {
            Self::Tcp(listener) => axum::serve(listener, app).with_graceful_shutdown(shutdown).await,
            #[cfg(unix)]
            Self::Unix(listener, path) => {
                let served = axum::serve(listener, app).with_graceful_shutdown(shutdown).await;
                cleanup_socket(&path);
                served
            }
        }
    }
}

#[cfg(unix)]
fn cleanup_socket(path: &Path) {
    if path.exists() {
        debug!(?path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(path) {
            warn!(?path, error = %e, "Failed to remove socket file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Requester, router};
    use crate::coordinator::{Coordinator, CoordinatorConfig};
    use crate::playback::{BackendError, PlaybackBackend};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct NoopBackend;

    #[async_trait]
    impl PlaybackBackend for NoopBackend {
        async fn play(&self, _track_ref: &str) -> Result<(), BackendError> {
            Ok(())
        }

        async fn pause(&self) -> Result<(), BackendError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_bind_tcp() {
        let listener = bind(&"tcp://127.0.0.1:0".parse().unwrap()).await.unwrap();
        match listener {
            ApiListener::Tcp(listener) => assert_ne!(listener.local_addr().unwrap().port(), 0),
            #[cfg(unix)]
            other => panic!("expected a TCP listener, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_serve_over_unix_socket() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alertify.sock");
        std::fs::write(&path, "stale").unwrap();

        let coord = Coordinator::new(CoordinatorConfig::default(), Arc::new(NoopBackend));
        let handle = coord.handle();
        let coord_task = tokio::spawn(coord.start());
        let app = router(Requester::new(handle.clone(), Duration::from_secs(1)), "v1");

        let listener = bind(&BindAddr::Unix(path.clone())).await.unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(listener.serve(app, async move {
            let _ = shutdown_rx.await;
        }));

        let mut stream = tokio::net::UnixStream::connect(&path).await.unwrap();
        stream
            .write_all(b"POST /v1/alert/silence HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "unexpected response: {response}");

        shutdown_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert!(!path.exists());

        handle.stop();
        coord_task.await.unwrap().unwrap();
    }
}

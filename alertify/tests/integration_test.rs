//! Integration tests for Alertify
//!
//! These tests drive the coordinator through its public surface with stub
//! backends and monitors.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use alertify::api::{self, RequestOutcome, Requester};
use alertify::coordinator::{
    Action, CommandError, Coordinator, CoordinatorConfig, CoordinatorError, CoordinatorHandle, LifecycleState,
    RequestError, SubmitError,
};
use alertify::monitor::{ChannelSource, ChatEvent, ChatMonitor, Monitor, MonitorError};
use alertify::playback::{BackendError, PlaybackBackend};
use alertify::ChatConfig;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const DEFAULT_TRACK: &str = "spotify:track:default";

/// Records calls and counts any overlap between them
#[derive(Default)]
struct ExclusiveBackend {
    delay: Duration,
    active: AtomicBool,
    overlaps: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl ExclusiveBackend {
    fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Default::default()
        })
    }

    async fn call(&self, name: String) {
        if self.active.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        tokio::time::sleep(self.delay).await;
        self.calls.lock().unwrap().push(name);
        self.active.store(false, Ordering::SeqCst);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlaybackBackend for ExclusiveBackend {
    async fn play(&self, track_ref: &str) -> Result<(), BackendError> {
        self.call(format!("play:{}", track_ref)).await;
        Ok(())
    }

    async fn pause(&self) -> Result<(), BackendError> {
        self.call("pause".to_string()).await;
        Ok(())
    }
}

/// Fires one alert as soon as it runs, then waits to be stopped
struct FireOnceMonitor {
    stop: CancellationToken,
    fired: AtomicBool,
}

impl FireOnceMonitor {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            stop: CancellationToken::new(),
            fired: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Monitor for FireOnceMonitor {
    async fn run(&self, sink: CoordinatorHandle) -> Result<(), MonitorError> {
        sink.request(Action::alert())
            .await
            .map_err(|e| MonitorError::EventStream(e.to_string()))?;
        self.fired.store(true, Ordering::SeqCst);
        self.stop.cancelled().await;
        Ok(())
    }

    fn request_stop(&self) {
        self.stop.cancel();
    }

    fn describe(&self) -> String {
        "fire-once monitor".to_string()
    }
}

/// Fails right away
struct BrokenMonitor;

#[async_trait]
impl Monitor for BrokenMonitor {
    async fn run(&self, _sink: CoordinatorHandle) -> Result<(), MonitorError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Err(MonitorError::InvalidAuth)
    }

    fn request_stop(&self) {}

    fn describe(&self) -> String {
        "broken monitor".to_string()
    }
}

/// Panics right away
struct PanickingMonitor;

#[async_trait]
impl Monitor for PanickingMonitor {
    async fn run(&self, _sink: CoordinatorHandle) -> Result<(), MonitorError> {
        panic!("monitor blew up");
    }

    fn request_stop(&self) {}

    fn describe(&self) -> String {
        "panicking monitor".to_string()
    }
}

fn coordinator(backend: Arc<ExclusiveBackend>) -> Coordinator {
    Coordinator::new(CoordinatorConfig::with_default_track(DEFAULT_TRACK), backend)
}

// =============================================================================
// Coordinator Tests
// =============================================================================

#[tokio::test]
async fn test_backend_never_called_concurrently() {
    let backend = ExclusiveBackend::with_delay(Duration::from_millis(2));
    let coord = coordinator(backend.clone());
    let handle = coord.handle();
    let coord_task = tokio::spawn(coord.start());

    let requests = (0..20).map(|i| {
        let handle = handle.clone();
        async move {
            let action = if i % 2 == 0 {
                Action::alert_track(format!("spotify:track:{}", i))
            } else {
                Action::Silence
            };
            handle.request(action).await
        }
    });
    let results = join_all(requests).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(backend.calls().len(), 20);
    assert_eq!(backend.overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(handle.metrics().commands_received, 20);

    handle.stop();
    coord_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_queued_command_dropped_at_stop() {
    let backend = ExclusiveBackend::with_delay(Duration::from_millis(200));
    let coord = coordinator(backend.clone());
    let handle = coord.handle();
    let coord_task = tokio::spawn(coord.start());

    let in_flight = handle.submit(Action::alert()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    let queued = handle.submit(Action::Silence).await.unwrap();

    assert!(handle.stop());

    // The in-flight call finishes and is answered once
    assert!(in_flight.await.unwrap().is_ok());
    // The queued command is never answered
    assert!(queued.await.is_err());

    tokio::time::timeout(Duration::from_secs(2), coord_task)
        .await
        .expect("coordinator should stop")
        .unwrap()
        .unwrap();
    assert_eq!(backend.calls(), vec![format!("play:{}", DEFAULT_TRACK)]);

    // Nothing is accepted once stopped
    assert!(matches!(handle.submit(Action::alert()).await, Err(SubmitError::Stopped)));
}

#[tokio::test]
async fn test_concurrent_stops_transition_once() {
    let backend = ExclusiveBackend::with_delay(Duration::ZERO);
    let coord = coordinator(backend);
    let handle = coord.handle();
    let coord_task = tokio::spawn(coord.start());
    tokio::time::sleep(Duration::from_millis(10)).await;

    let stops = (0..100).map(|_| {
        let handle = handle.clone();
        tokio::spawn(async move { handle.stop() })
    });
    let transitions = join_all(stops).await.into_iter().filter(|r| *r.as_ref().unwrap()).count();
    assert_eq!(transitions, 1);

    tokio::time::timeout(Duration::from_secs(2), coord_task)
        .await
        .expect("coordinator should stop")
        .unwrap()
        .unwrap();
    assert_eq!(handle.state(), LifecycleState::Stopped);
    assert!(!handle.stop());
}

#[tokio::test]
async fn test_timeout_precedence() {
    let backend = ExclusiveBackend::with_delay(Duration::from_millis(300));
    let coord = coordinator(backend.clone());
    let handle = coord.handle();
    let coord_task = tokio::spawn(coord.start());
    let requester = Requester::new(handle.clone(), Duration::from_millis(50));

    assert!(matches!(requester.request(Action::alert()).await, RequestOutcome::TimedOut));
    assert!(backend.calls().is_empty());

    // The backend call still completes and the abandoned answer doesn't block anything
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(backend.calls(), vec![format!("play:{}", DEFAULT_TRACK)]);
    assert_eq!(handle.metrics().abandoned_responses, 1);

    let patient = Requester::new(handle.clone(), Duration::from_secs(2));
    assert!(matches!(patient.request(Action::Silence).await, RequestOutcome::Accepted));

    handle.stop();
    coord_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unknown_kind_is_an_error_response() {
    let backend = ExclusiveBackend::with_delay(Duration::ZERO);
    let coord = coordinator(backend.clone());
    let handle = coord.handle();
    let coord_task = tokio::spawn(coord.start());

    let result = handle.request(Action::from_kind("explode", None)).await;
    assert!(matches!(
        result,
        Err(RequestError::Command(CommandError::Unsupported { ref kind })) if kind == "explode"
    ));

    handle.request(Action::from_kind("alert", None)).await.unwrap();
    assert_eq!(backend.calls(), vec![format!("play:{}", DEFAULT_TRACK)]);
    assert_eq!(handle.state(), LifecycleState::Running);

    handle.stop();
    coord_task.await.unwrap().unwrap();
}

// =============================================================================
// Monitor Tests
// =============================================================================

#[tokio::test]
async fn test_monitor_alert_end_to_end() {
    let backend = ExclusiveBackend::with_delay(Duration::ZERO);
    let monitor = FireOnceMonitor::new();
    let mut coord = coordinator(backend.clone());
    coord.register_monitor(monitor.clone());
    assert_eq!(coord.monitors(), vec!["fire-once monitor"]);

    let handle = coord.handle();
    let coord_task = tokio::spawn(coord.start());

    tokio::time::timeout(Duration::from_secs(2), async {
        while !monitor.fired.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("monitor should fire");
    assert_eq!(backend.calls(), vec![format!("play:{}", DEFAULT_TRACK)]);

    handle.stop();
    let result = tokio::time::timeout(Duration::from_secs(2), coord_task)
        .await
        .expect("coordinator and monitors should stop")
        .unwrap();
    assert!(result.is_ok());
    assert!(monitor.stop.is_cancelled());
}

#[tokio::test]
async fn test_monitor_failure_ends_run() {
    let backend = ExclusiveBackend::with_delay(Duration::ZERO);
    let healthy = FireOnceMonitor::new();
    let mut coord = coordinator(backend);
    coord.register_monitor(healthy.clone());
    coord.register_monitor(Arc::new(BrokenMonitor));
    let handle = coord.handle();

    let result = tokio::time::timeout(Duration::from_secs(2), coord.start())
        .await
        .expect("a failing monitor should end the run");

    match result {
        Err(CoordinatorError::Monitor { monitor, source }) => {
            assert_eq!(monitor, "broken monitor");
            assert!(matches!(source, MonitorError::InvalidAuth));
        }
        other => panic!("Expected monitor error, got {:?}", other),
    }
    assert_eq!(handle.state(), LifecycleState::Stopped);
    assert!(healthy.stop.is_cancelled());
}

#[tokio::test]
async fn test_monitor_panic_is_reported() {
    let backend = ExclusiveBackend::with_delay(Duration::ZERO);
    let mut coord = coordinator(backend);
    coord.register_monitor(Arc::new(PanickingMonitor));

    let result = tokio::time::timeout(Duration::from_secs(2), coord.start())
        .await
        .expect("a panicking monitor should end the run");
    assert!(matches!(
        result,
        Err(CoordinatorError::TaskPanicked { ref component }) if component == "panicking monitor"
    ));
}

#[tokio::test]
async fn test_chat_monitor_end_to_end() {
    let backend = ExclusiveBackend::with_delay(Duration::ZERO);
    let (events, source) = ChannelSource::channel(4);
    let chat = ChatConfig {
        enabled: true,
        user: "production".to_string(),
        channel: "devops-production".to_string(),
        pattern: "alert".to_string(),
        ..Default::default()
    };

    let mut coord = coordinator(backend.clone());
    coord.register_monitor(Arc::new(ChatMonitor::new(&chat, Box::new(source)).unwrap()));
    let handle = coord.handle();
    let coord_task = tokio::spawn(coord.start());

    events
        .send(ChatEvent::Message {
            user: "production".to_string(),
            channel: "devops-production".to_string(),
            text: "alert: checkout is down".to_string(),
        })
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while backend.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("chat alert should reach the backend");

    // A stream error is fatal for the whole run
    events
        .send(ChatEvent::Error {
            message: "socket closed".to_string(),
        })
        .await
        .unwrap();
    let result = tokio::time::timeout(Duration::from_secs(2), coord_task)
        .await
        .expect("stream error should end the run")
        .unwrap();
    assert!(matches!(
        result,
        Err(CoordinatorError::Monitor {
            source: MonitorError::EventStream(_),
            ..
        })
    ));
    assert_eq!(backend.calls(), vec![format!("play:{}", DEFAULT_TRACK)]);
}

// =============================================================================
// HTTP Tests
// =============================================================================

#[tokio::test]
async fn test_concurrent_http_alerts() {
    let backend = ExclusiveBackend::with_delay(Duration::from_millis(5));
    let coord = coordinator(backend.clone());
    let handle = coord.handle();
    let coord_task = tokio::spawn(coord.start());
    let app = api::router(Requester::new(handle.clone(), Duration::from_secs(10)), "v1");

    let posts = (0..50).map(|i| {
        let app = app.clone();
        let uri = if i % 2 == 0 { "/alert/play" } else { "/v1/alert/play" };
        async move {
            let request = Request::builder()
                .method(Method::POST)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            app.oneshot(request).await.unwrap().status()
        }
    });
    let statuses = join_all(posts).await;

    assert!(statuses.iter().all(|s| *s == StatusCode::OK));
    assert_eq!(backend.calls().len(), 50);
    assert_eq!(backend.overlaps.load(Ordering::SeqCst), 0);

    handle.stop();
    coord_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_http_after_shutdown_is_gateway_timeout() {
    let backend = ExclusiveBackend::with_delay(Duration::ZERO);
    let coord = coordinator(backend.clone());
    let handle = coord.handle();
    let app = api::router(Requester::new(handle.clone(), Duration::from_secs(1)), "v1");

    // Run until the "server" signal fires
    coord
        .start_until(tokio::time::sleep(Duration::from_millis(10)))
        .await
        .unwrap();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/alert/play")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(backend.calls().is_empty());
}

//! HTTP API
//!
//! `POST /alert/play` and `POST /alert/silence`, served both under the
//! version prefix and unprefixed. Each request waits a bounded time for the
//! coordinator:
//!
//! - `200` the command ran
//! - `500` the playback backend failed
//! - `504` no answer in time, or the coordinator is stopping
//!
//! The API listens on TCP or on a Unix domain socket; see [`bind`].

mod listener;
mod requester;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::coordinator::Action;

pub use listener::{ApiListener, bind};
pub use requester::{RequestOutcome, Requester};

/// Content type set on every response
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Optional body of `POST /alert/play`
#[derive(Debug, Default, Deserialize)]
struct PlayRequest {
    track: Option<String>,
}

/// Build the API router
pub fn router(requester: Requester, version: &str) -> Router {
    let routes = Router::new()
        .route("/alert/play", post(alert_play))
        .route("/alert/silence", post(alert_silence));

    for route in ["/alert/play", "/alert/silence"] {
        info!(method = "POST", path = route, %version, "Registering HTTP route");
    }

    let version = version.trim_matches('/');
    let app = if version.is_empty() {
        routes
    } else {
        Router::new().nest(&format!("/{}", version), routes.clone()).merge(routes)
    };

    app.with_state(requester)
}

async fn alert_play(State(requester): State<Requester>, body: Bytes) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        PlayRequest::default()
    } else {
        match serde_json::from_slice::<PlayRequest>(&body) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Invalid alert request body");
                return json_response(StatusCode::BAD_REQUEST, Some(format!("Invalid request body: {}", e)));
            }
        }
    };

    let action = match request.track {
        Some(track) => Action::alert_track(track),
        None => Action::alert(),
    };
    info!(%action, "POST /alert/play");
    respond("trigger alert", requester.request(action).await)
}

async fn alert_silence(State(requester): State<Requester>) -> Response {
    info!("POST /alert/silence");
    respond("silence alert", requester.request(Action::Silence).await)
}

fn respond(what: &str, outcome: RequestOutcome) -> Response {
    match outcome {
        RequestOutcome::Accepted => json_response(StatusCode::OK, None),
        RequestOutcome::Failed(e) => {
            warn!(error = %e, "Failed to {}", what);
            json_response(StatusCode::INTERNAL_SERVER_ERROR, Some(e.to_string()))
        }
        RequestOutcome::TimedOut => {
            warn!("Timed out trying to {}", what);
            json_response(StatusCode::GATEWAY_TIMEOUT, Some(format!("Timed out trying to {}", what)))
        }
        RequestOutcome::Unavailable => json_response(
            StatusCode::GATEWAY_TIMEOUT,
            Some("Alert coordinator is shutting down".to_string()),
        ),
    }
}

fn json_response(status: StatusCode, error: Option<String>) -> Response {
    let body = match error {
        Some(message) => serde_json::json!({ "error": message }).to_string(),
        None => String::new(),
    };
    (status, [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response()
}

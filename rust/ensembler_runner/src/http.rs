//! HTTP transport.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::error_handling::HandleErrorLayer;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{BoxError, Json, Router};
use serde_json::{json, Value as JsonValue};
use tower::ServiceBuilder;
use tracing::{debug, warn};

use crate::error::RequestError;
use crate::runtime::{collect_headers, EnsemblerRuntime};

/// Routes: `POST /ensemble`, `GET /health`, `GET /ready`.
///
/// Every request is bounded by `request_timeout`; an expired request gets
/// `504` and leaves the runner serving.
pub fn router(runtime: Arc<EnsemblerRuntime>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/ensemble", post(ensemble))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(runtime)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(request_timeout),
        )
}

async fn ensemble(
    State(runtime): State<Arc<EnsemblerRuntime>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<JsonValue>, RequestError> {
    if !runtime.is_ready() {
        return Err(RequestError::NotReady);
    }
    let payload: JsonValue = serde_json::from_slice(&body).map_err(|err| {
        debug!(error = %err, "Rejecting malformed request body");
        RequestError::Malformed(err.to_string())
    })?;
    let result = runtime
        .ensemble_json(&payload, Some(collect_headers(&headers)))
        .await
        .inspect_err(|err| {
            if err.status().is_server_error() {
                warn!(error = %err, "Ensemble request failed");
            }
        })?;
    Ok(Json(result))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn ready(State(runtime): State<Arc<EnsemblerRuntime>>) -> Response {
    let phase = runtime.lifecycle().phase();
    let status = if runtime.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "phase": phase.to_string() }))).into_response()
}

async fn handle_middleware_error(err: BoxError) -> Response {
    if err.is::<tower::timeout::error::Elapsed>() {
        warn!("Request exceeded the deadline");
        return (
            StatusCode::GATEWAY_TIMEOUT,
            Json(json!({ "error": "request timed out" })),
        )
            .into_response();
    }
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err.to_string() })),
    )
        .into_response()
}

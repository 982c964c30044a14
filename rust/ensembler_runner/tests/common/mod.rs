#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ensembler_plugin_common::{EnsembleInput, Ensembler, EnsemblerError, FnEnsembler, Headers, Value};
use ensembler_plugin_host::{ArtifactError, HostError};
use ensembler_runner::{http, EnsemblerLoader, EnsemblerRuntime, PoolSettings};
use http_body_util::BodyExt;
use serde_json::Value as JsonValue;
use tower::ServiceExt;

pub const SETTINGS: PoolSettings = PoolSettings {
    workers: 2,
    queue_depth: 4,
};

/// Returns `predictions[<first route>]["data"]["version"]`.
pub fn routed_choice() -> Arc<dyn Ensembler> {
    Arc::new(FnEnsembler::new(|input: &EnsembleInput, _: Option<&Headers>| {
        let (_, response) = input
            .predictions
            .iter()
            .next()
            .ok_or_else(|| EnsemblerError::InvalidInput("no route responses".into()))?;
        Ok(response["data"]["version"].clone())
    }))
}

pub fn failing() -> Arc<dyn Ensembler> {
    Arc::new(FnEnsembler::new(|_: &EnsembleInput, _: Option<&Headers>| {
        Err(EnsemblerError::Failed("division by zero\n  at line 3".into()))
    }))
}

/// Panics for `client.id == 0`, otherwise echoes the id.
pub fn panicking() -> Arc<dyn Ensembler> {
    Arc::new(FnEnsembler::new(|input: &EnsembleInput, _: Option<&Headers>| {
        let id = input.features["client.id"].clone();
        if id == Value::Int(0) {
            panic!("client id must be positive");
        }
        Ok(id)
    }))
}

/// Returns the prediction keys in order.
pub fn prediction_keys() -> Arc<dyn Ensembler> {
    Arc::new(FnEnsembler::new(|input: &EnsembleInput, _: Option<&Headers>| {
        Ok(Value::List(input.predictions.keys().map(Value::from).collect()))
    }))
}

pub fn sleeping(duration: Duration) -> Arc<dyn Ensembler> {
    Arc::new(FnEnsembler::new(move |_: &EnsembleInput, _: Option<&Headers>| {
        std::thread::sleep(duration);
        Ok(Value::Null)
    }))
}

pub fn ready_runtime(ensembler: Arc<dyn Ensembler>) -> Arc<EnsemblerRuntime> {
    Arc::new(EnsemblerRuntime::with_ensembler(ensembler, SETTINGS).expect("runtime starts"))
}

pub fn app(runtime: Arc<EnsemblerRuntime>) -> Router {
    http::router(runtime, Duration::from_secs(5))
}

pub async fn post_json(app: Router, body: impl Into<Body>) -> (StatusCode, JsonValue) {
    let request = Request::builder()
        .method("POST")
        .uri("/ensemble")
        .header("content-type", "application/json")
        .body(body.into())
        .expect("request");
    send(app, request).await
}

pub async fn get(app: Router, uri: &str) -> (StatusCode, JsonValue) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, JsonValue) {
    let response = app.oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

/// Hands out a fixed ensembler, or fails like a missing artifact.
pub struct StaticLoader(pub Option<Arc<dyn Ensembler>>);

#[async_trait]
impl EnsemblerLoader for StaticLoader {
    async fn load(&self, uri: &str) -> Result<Arc<dyn Ensembler>, HostError> {
        self.0
            .clone()
            .ok_or_else(|| ArtifactError::NotFound(uri.to_string()).into())
    }
}

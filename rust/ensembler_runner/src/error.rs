//! Runner errors and their mapping onto HTTP and GRPC statuses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ensembler_plugin_common::EnsemblerError;
use ensembler_plugin_host::HostError;

/// Fatal conditions at startup or while serving.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Failed to load ensembler from {uri}: {source}")]
    Load {
        uri: String,
        #[source]
        source: HostError,
    },
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server failed: {0}")]
    Http(#[source] std::io::Error),
    #[error("GRPC server failed: {0}")]
    Grpc(#[from] tonic::transport::Error),
    #[error("Failed to start worker pool: {0}")]
    Pool(#[source] std::io::Error),
}

/// Failure of a single request. Never affects other requests.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Malformed request body: {0}")]
    Malformed(String),
    #[error("Ensembler is not ready")]
    NotReady,
    #[error(transparent)]
    Ensembler(#[from] EnsemblerError),
    #[error("Ensembler worker pool is shut down")]
    PoolClosed,
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::Malformed(_) => StatusCode::BAD_REQUEST,
            RequestError::NotReady | RequestError::PoolClosed => StatusCode::SERVICE_UNAVAILABLE,
            RequestError::Ensembler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to clients. User-code failures keep only their first line.
    pub fn public_message(&self) -> String {
        let message = self.to_string();
        match self {
            RequestError::Ensembler(_) => message.lines().next().unwrap_or_default().to_string(),
            _ => message,
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.public_message() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<RequestError> for tonic::Status {
    fn from(err: RequestError) -> Self {
        let message = err.public_message();
        match err {
            RequestError::Malformed(_) => tonic::Status::invalid_argument(message),
            RequestError::NotReady | RequestError::PoolClosed => tonic::Status::unavailable(message),
            RequestError::Ensembler(_) => tonic::Status::internal(message),
        }
    }
}

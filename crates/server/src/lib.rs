//! Document QA Server
//!
//! Provides the HTTP endpoints for batch and streamed question answering and
//! for document uploads.

pub mod http;
pub mod metrics;
pub mod state;

pub use http::create_router;
pub use metrics::{init_metrics, record_error, record_request};
pub use state::{AppState, ModelClients};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use docqa_core::Error;
use docqa_rag::RagError;
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Vector store is not ready.")]
    NotReady,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("File upload failed for files: {}", .0.join(", "))]
    UploadFailed(Vec<String>),

    #[error(transparent)]
    Pipeline(#[from] Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RagError> for ServerError {
    fn from(err: RagError) -> Self {
        ServerError::Pipeline(err.into())
    }
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::UploadFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Pipeline(err) => match err {
                Error::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                Error::Generation(_)
                | Error::MalformedToolOutput(_)
                | Error::Embedding(_)
                | Error::Retrieval(_)
                | Error::Rerank(_)
                | Error::TransportClosed(_) => StatusCode::BAD_GATEWAY,
                Error::Ingestion(_) | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for the error counter
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::NotReady => "not_ready",
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::UploadFailed(_) => "upload_failed",
            ServerError::Pipeline(err) => match err {
                Error::UpstreamUnavailable(_) => "upstream_unavailable",
                Error::Generation(_) => "generation",
                Error::MalformedToolOutput(_) => "malformed_tool_output",
                Error::Embedding(_) => "embedding",
                Error::Retrieval(_) => "retrieval",
                Error::Rerank(_) => "rerank",
                Error::TransportClosed(_) => "transport_closed",
                Error::Ingestion(_) => "ingestion",
                Error::Config(_) => "config",
            },
            ServerError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        record_error(self.kind());

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = match &self {
            ServerError::UploadFailed(failed) => serde_json::json!({
                "detail": self.to_string(),
                "failed": failed,
            }),
            _ => serde_json::json!({ "detail": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

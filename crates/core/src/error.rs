//! Core error type
//!
//! Each crate keeps its own error enum and converts into this one at the
//! collaborator-trait boundary.

use thiserror::Error;

/// Core errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The vector store is not reachable or not ready.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A hosted model call failed or returned an unexpected shape.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Tool-call arguments did not match the declared schema.
    #[error("Malformed tool output: {0}")]
    MalformedToolOutput(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Rerank error: {0}")]
    Rerank(String),

    /// The model-side stream closed abnormally after it was opened.
    #[error("Transport closed: {0}")]
    TransportClosed(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for mid-stream transport failures.
    pub fn is_transport_closed(&self) -> bool {
        matches!(self, Error::TransportClosed(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

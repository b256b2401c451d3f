//! Hosted model integration
//!
//! Features:
//! - Chat with tool calling and grounding documents
//! - Streamed chat decoded from server-sent events
//! - Batch embeddings and reranking
//! - The search-query generation tool

pub mod cohere;
pub mod streaming;
pub mod tools;

pub use cohere::CohereClient;
pub use streaming::{chat_event_stream, parse_stream_event, sse_data_stream, SseBuffer};
pub use tools::{database_search_tool, DATABASE_SEARCH_TOOL, QUERY_GENERATION_INSTRUCTION};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The response body failed after the stream was established
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<LlmError> for docqa_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::StreamInterrupted(msg) => docqa_core::Error::TransportClosed(msg),
            LlmError::Configuration(msg) => docqa_core::Error::Config(msg),
            other => docqa_core::Error::Generation(other.to_string()),
        }
    }
}

//! Core traits and types for the document QA service
//!
//! This crate provides foundational types used across all other crates:
//! - Request/answer types (questions, chunks, grounding documents, citations)
//! - Model-facing request/response types (chat, tools, stream events)
//! - Collaborator traits for the hosted models and the vector store
//! - Error types

pub mod answer;
pub mod document;
pub mod error;
pub mod llm_types;
pub mod traits;

pub use answer::{Answer, AnswerChunk, Question};
pub use document::{Chunk, Citation, GroundingDocument, StoredChunk};
pub use error::{Error, Result};
pub use llm_types::{
    ChatMessage, ChatRequest, ChatResponse, ChatStreamEvent, CitationMode, CitationSource,
    EmbedInputType, ModelCitation, RerankHit, Role, ToolCall, ToolDefinition,
};
pub use traits::{ChatEventStream, ChatModel, Embedder, InsertOutcome, Reranker, VectorStore};

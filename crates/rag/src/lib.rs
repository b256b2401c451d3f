//! Retrieval-augmented answer pipeline
//!
//! Features:
//! - Query expansion through a tool-calling chat model
//! - Hybrid (lexical + dense) search via Qdrant with RRF fusion
//! - Direct and expanded retrieval with bounded, order-preserving fan-out
//! - Model-based reranking into positional grounding documents
//! - Batch and streamed answer generation with citation resolution
//! - Ingestion of PDF/markdown/text files into header-aware chunks

pub mod chunker;
pub mod generator;
pub mod ingestion;
pub mod pipeline;
pub mod query_expansion;
pub mod reranker;
pub mod retriever;
pub mod vector_store;

pub use chunker::{split_text, ChunkConfig, MarkdownChunker, Section};
pub use generator::{transcode, AnswerGenerator, AnswerStream};
pub use ingestion::{extract_text, IngestReport, Ingestor, UploadedFile};
pub use pipeline::AnswerPipeline;
pub use query_expansion::{parse_search_queries, QueryExpander};
pub use reranker::DocumentReranker;
pub use retriever::{Retriever, RetrieverConfig};
pub use vector_store::{extract_keywords, QdrantStore};

use thiserror::Error;

/// RAG errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Reranker error: {0}")]
    Reranker(String),

    #[error("Malformed tool output: {0}")]
    MalformedToolOutput(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    /// A collaborator failed; its classification is kept as is
    #[error(transparent)]
    Core(#[from] docqa_core::Error),
}

impl From<RagError> for docqa_core::Error {
    fn from(err: RagError) -> Self {
        use docqa_core::Error;

        match err {
            RagError::Core(inner) => inner,
            RagError::Embedding(msg) => Error::Embedding(msg),
            RagError::VectorStore(msg) | RagError::Search(msg) => Error::Retrieval(msg),
            RagError::Reranker(msg) => Error::Rerank(msg),
            RagError::MalformedToolOutput(msg) => Error::MalformedToolOutput(msg),
            RagError::Connection(msg) => Error::UpstreamUnavailable(msg),
            RagError::Extraction(msg) => Error::Ingestion(msg),
            RagError::UnsupportedFile(name) => {
                Error::Ingestion(format!("Unsupported file type: {}", name))
            }
        }
    }
}

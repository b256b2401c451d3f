//! Centralized defaults
//!
//! Single source for endpoints, model names and tuning values used by the
//! settings defaults and by the crates that need a fallback.

/// Service endpoints
pub mod endpoints {
    /// Hosted model API base URL
    pub const MODEL_API_DEFAULT: &str = "https://api.cohere.com";

    /// Qdrant gRPC endpoint
    pub const QDRANT_DEFAULT: &str = "http://localhost:6334";
}

/// Hosted model names
pub mod models {
    pub const CHAT: &str = "command-r-08-2024";
    pub const CHAT_PLUS: &str = "command-r-08-2024";
    pub const EMBED: &str = "embed-english-v3.0";
    pub const RERANK: &str = "rerank-v3.5";

    /// Request timeout for hosted model calls
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;
}

/// Retrieval defaults
pub mod retrieval {
    /// Results per hybrid search
    pub const SEARCH_LIMIT: usize = 5;

    /// Documents kept after reranking
    pub const RERANK_TOP_N: usize = 3;

    /// 0 means no limit on concurrent searches
    pub const MAX_CONCURRENT_SEARCHES: usize = 0;
}

/// Vector store defaults
pub mod vector_store {
    pub const COLLECTION: &str = "Documents";

    /// Output dimension of the default embedding model
    pub const VECTOR_DIM: u64 = 1024;

    /// Payload keys
    pub const FIELD_FILENAME: &str = "filename";
    pub const FIELD_TITLE: &str = "title";
    pub const FIELD_CONTENT: &str = "chunk_content";
}

/// Ingestion defaults
pub mod ingestion {
    /// Chunk size in characters
    pub const CHUNK_SIZE: usize = 500;

    /// Overlap between consecutive chunks in characters
    pub const CHUNK_OVERLAP: usize = 50;

    /// Maximum texts per embedding request
    pub const EMBED_BATCH_SIZE: usize = 96;

    /// Deepest markdown header level that opens a section
    pub const MAX_HEADER_LEVEL: usize = 6;
}

/// HTTP server defaults
pub mod server {
    pub const HOST: &str = "0.0.0.0";
    pub const PORT: u16 = 8000;
    pub const REQUEST_TIMEOUT_SECS: u64 = 120;

    /// 50 MiB
    pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
}

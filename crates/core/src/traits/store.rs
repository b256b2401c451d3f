//! Vector store trait

use async_trait::async_trait;

use crate::{Chunk, Result, StoredChunk};

/// Result of a batch insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub has_errors: bool,
}

/// Document collection supporting hybrid search
#[async_trait]
pub trait VectorStore: Send + Sync + 'static {
    /// Whether the store accepts queries right now
    async fn is_ready(&self) -> bool;

    /// Create the collection and its indexes if missing
    ///
    /// Idempotent. Stores without setup keep the default.
    async fn ensure_collection(&self) -> Result<()> {
        Ok(())
    }

    /// Fused lexical + vector search
    ///
    /// `text` drives the lexical half and `vector` the dense half. Returns at
    /// most `limit` chunks, best first.
    async fn hybrid_search(&self, text: &str, vector: &[f32], limit: usize) -> Result<Vec<Chunk>>;

    /// Insert chunks with their precomputed vectors
    async fn insert_many(&self, chunks: Vec<StoredChunk>) -> Result<InsertOutcome>;
}

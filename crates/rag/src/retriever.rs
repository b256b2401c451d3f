//! Direct and expanded retrieval
//!
//! Direct retrieval embeds the question and runs one hybrid search.
//! Expanded retrieval asks the chat model for search queries, embeds them in
//! one batch and runs one hybrid search per query concurrently. Results are
//! flattened by query index, then by the store's order within each query.

use std::sync::Arc;
use std::time::Instant;

use docqa_config::RetrievalConfig;
use docqa_core::{Chunk, EmbedInputType, Embedder, VectorStore};
use futures::future::try_join_all;
use futures::{stream, StreamExt, TryStreamExt};

use crate::query_expansion::QueryExpander;
use crate::RagError;

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Results per hybrid search
    pub search_limit: usize,
    /// Cap on in-flight searches during fan-out (0 = unbounded)
    pub max_concurrent_searches: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for RetrieverConfig {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            search_limit: config.search_limit,
            max_concurrent_searches: config.max_concurrent_searches,
        }
    }
}

/// Retrieval over the vector store
pub struct Retriever {
    expander: QueryExpander,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(
        expander: QueryExpander,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            expander,
            embedder,
            store,
            config,
        }
    }

    /// One embedding, one hybrid search with the raw question
    pub async fn retrieve_direct(&self, question: &str) -> Result<Vec<Chunk>, RagError> {
        let start = Instant::now();
        let vectors = self.embed_queries(&[question.to_string()]).await?;

        let chunks = self.search(question, &vectors[0]).await?;

        tracing::debug!(
            candidates = chunks.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Direct retrieval complete"
        );
        Ok(chunks)
    }

    /// Expand the question and search with every generated query
    ///
    /// No queries means no embedding call, no searches and no candidates.
    pub async fn retrieve_expanded(&self, question: &str) -> Result<Vec<Chunk>, RagError> {
        let start = Instant::now();
        let queries = self.expander.expand(question).await?;

        let chunks = self.search_all(&queries).await?;

        tracing::debug!(
            queries = queries.len(),
            candidates = chunks.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Expanded retrieval complete"
        );
        Ok(chunks)
    }

    /// Run one hybrid search per query and flatten in query order
    ///
    /// The first failing search fails the whole call.
    pub async fn search_all(&self, queries: &[String]) -> Result<Vec<Chunk>, RagError> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embed_queries(queries).await?;
        let searches = queries
            .iter()
            .zip(vectors.iter())
            .map(|(query, vector)| self.search(query, vector))
            .collect::<Vec<_>>();

        let results: Vec<Vec<Chunk>> = match self.config.max_concurrent_searches {
            0 => try_join_all(searches).await?,
            limit => stream::iter(searches).buffered(limit).try_collect().await?,
        };

        Ok(results.into_iter().flatten().collect())
    }

    async fn embed_queries(&self, queries: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let vectors = self
            .embedder
            .embed(queries, EmbedInputType::SearchQuery)
            .await?;

        if vectors.len() != queries.len() {
            return Err(RagError::Embedding(format!(
                "expected {} embeddings, got {}",
                queries.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    async fn search(&self, text: &str, vector: &[f32]) -> Result<Vec<Chunk>, RagError> {
        metrics::counter!("docqa_retrieval_searches_total").increment(1);
        let chunks = self
            .store
            .hybrid_search(text, vector, self.config.search_limit)
            .await?;
        Ok(chunks)
    }
}

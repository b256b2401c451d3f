//! Model-based reranking
//!
//! Candidates go to the hosted rerank model; the top hits come back as
//! grounding documents numbered `0..K` in relevance order.

use std::sync::Arc;

use docqa_core::{Chunk, GroundingDocument, Reranker};

use crate::RagError;

/// Reorders and truncates candidate chunks
pub struct DocumentReranker {
    reranker: Arc<dyn Reranker>,
    top_n: usize,
}

impl DocumentReranker {
    pub fn new(reranker: Arc<dyn Reranker>, top_n: usize) -> Self {
        Self { reranker, top_n }
    }

    /// Keep at most `top_n` candidates, best first
    ///
    /// An empty candidate list returns immediately without a model call.
    pub async fn rerank(
        &self,
        question: &str,
        candidates: Vec<Chunk>,
    ) -> Result<Vec<GroundingDocument>, RagError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = candidates.iter().map(|c| c.content.clone()).collect();
        let mut hits = self.reranker.rerank(question, &texts, self.top_n).await?;

        hits.retain(|hit| {
            let in_range = hit.index < candidates.len();
            if !in_range {
                tracing::warn!(
                    index = hit.index,
                    candidates = candidates.len(),
                    "Rerank index out of range"
                );
            }
            in_range
        });
        hits.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        hits.truncate(self.top_n);

        tracing::debug!(
            candidates = candidates.len(),
            documents = hits.len(),
            "Reranked candidates"
        );

        let selected = hits.iter().map(|hit| candidates[hit.index].clone());
        Ok(GroundingDocument::from_chunks(selected))
    }
}

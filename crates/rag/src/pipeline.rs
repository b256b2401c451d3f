//! Answer pipeline orchestration
//!
//! ```text
//! rerank = false:  embed question -> 1 hybrid search -> generate
//! rerank = true:   expand -> embed N -> N hybrid searches -> rerank top K -> generate
//! ```
//!
//! Retrieval, including rerank truncation, always completes before the
//! generation call is issued.

use std::time::Instant;

use docqa_core::{Answer, GroundingDocument, Question};

use crate::generator::{AnswerGenerator, AnswerStream};
use crate::reranker::DocumentReranker;
use crate::retriever::Retriever;
use crate::RagError;

/// Retrieval plus generation
pub struct AnswerPipeline {
    retriever: Retriever,
    reranker: DocumentReranker,
    generator: AnswerGenerator,
}

impl AnswerPipeline {
    pub fn new(
        retriever: Retriever,
        reranker: DocumentReranker,
        generator: AnswerGenerator,
    ) -> Self {
        Self {
            retriever,
            reranker,
            generator,
        }
    }

    /// Select the grounding documents for a question
    pub async fn documents(&self, question: &Question) -> Result<Vec<GroundingDocument>, RagError> {
        let start = Instant::now();

        let documents = if question.rerank {
            let candidates = self.retriever.retrieve_expanded(&question.text).await?;
            self.reranker.rerank(&question.text, candidates).await?
        } else {
            let chunks = self.retriever.retrieve_direct(&question.text).await?;
            GroundingDocument::from_chunks(chunks)
        };

        let elapsed = start.elapsed();
        metrics::histogram!("docqa_stage_latency_seconds", "stage" => "retrieval")
            .record(elapsed.as_secs_f64());
        tracing::info!(
            question_len = question.text.len(),
            rerank = question.rerank,
            documents = documents.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Retrieved documents"
        );

        Ok(documents)
    }

    /// Retrieve, then generate a complete answer
    pub async fn answer_batch(&self, question: &Question) -> Result<Answer, RagError> {
        let documents = self.documents(question).await?;

        let start = Instant::now();
        let answer = self.generator.generate(&question.text, documents).await?;

        let elapsed = start.elapsed();
        metrics::histogram!("docqa_stage_latency_seconds", "stage" => "generation")
            .record(elapsed.as_secs_f64());
        tracing::info!(
            answer_len = answer.answer.len(),
            citations = answer.citations.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Generated answer"
        );

        Ok(answer)
    }

    /// Retrieve, then open a streamed answer
    ///
    /// Errors before the model stream is open are returned here; the
    /// returned stream itself never fails.
    pub async fn answer_stream(&self, question: &Question) -> Result<AnswerStream, RagError> {
        let documents = self.documents(question).await?;
        self.generator.generate_stream(&question.text, documents).await
    }
}

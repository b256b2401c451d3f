//! Grounded answer generation
//!
//! Batch mode returns the first text block and one citation per model
//! citation. Streaming mode transcodes model events into `AnswerChunk`s:
//!
//! ```text
//! content-delta  -> ResponseChunk { text }
//! citation-start -> Citation { title, text }   (first source only)
//! anything else  -> nothing
//! ```
//!
//! Citations are resolved by source id against the documents that were sent;
//! a source that does not name one of them is dropped.

use std::pin::Pin;
use std::sync::Arc;

use docqa_core::{
    Answer, AnswerChunk, ChatEventStream, ChatMessage, ChatModel, ChatRequest, ChatStreamEvent,
    Citation, CitationMode, CitationSource, GroundingDocument,
};
use futures::{Stream, StreamExt};

use crate::RagError;

/// Streamed answer; ends when the model stream ends
pub type AnswerStream = Pin<Box<dyn Stream<Item = AnswerChunk> + Send>>;

/// Sends the question and its documents to the chat model
pub struct AnswerGenerator {
    chat: Arc<dyn ChatModel>,
    stream_chat: Arc<dyn ChatModel>,
    citation_mode: CitationMode,
}

impl AnswerGenerator {
    /// `stream_chat` serves streamed answers and may be the same model as `chat`
    pub fn new(
        chat: Arc<dyn ChatModel>,
        stream_chat: Arc<dyn ChatModel>,
        citation_mode: CitationMode,
    ) -> Self {
        Self {
            chat,
            stream_chat,
            citation_mode,
        }
    }

    /// Single-shot answer with citations
    pub async fn generate(
        &self,
        question: &str,
        documents: Vec<GroundingDocument>,
    ) -> Result<Answer, RagError> {
        let request = ChatRequest::new(vec![ChatMessage::user(question)])
            .with_documents(documents.clone());
        let response = self.chat.chat(request).await?;

        let citations = response
            .citations
            .iter()
            .filter_map(|citation| resolve_citation(&documents, &citation.sources))
            .collect();

        Ok(Answer {
            answer: response.first_text().to_string(),
            citations,
        })
    }

    /// Open the model stream and transcode it
    ///
    /// Failing to open the stream is an error; failures after that end the
    /// returned stream.
    pub async fn generate_stream(
        &self,
        question: &str,
        documents: Vec<GroundingDocument>,
    ) -> Result<AnswerStream, RagError> {
        let request = ChatRequest::new(vec![ChatMessage::user(question)])
            .with_documents(documents.clone())
            .with_citation_mode(self.citation_mode);

        let events = self.stream_chat.chat_stream(request).await?;
        tracing::debug!(
            model = self.stream_chat.model_name(),
            documents = documents.len(),
            "Opened answer stream"
        );
        Ok(transcode(events, documents))
    }
}

/// Map model stream events to answer chunks
///
/// A transport failure mid-stream ends the output like a normal finish; it
/// is logged and counted in `docqa_stream_transport_closed_total`.
pub fn transcode(events: ChatEventStream, documents: Vec<GroundingDocument>) -> AnswerStream {
    Box::pin(async_stream::stream! {
        let mut events = events;
        let mut emitted = 0usize;

        while let Some(event) = events.next().await {
            match event {
                Ok(ChatStreamEvent::ContentDelta { text }) => {
                    emitted += 1;
                    yield AnswerChunk::ResponseChunk { text };
                }
                Ok(ChatStreamEvent::CitationStart { sources }) => {
                    if let Some(citation) = resolve_citation(&documents, &sources) {
                        emitted += 1;
                        yield AnswerChunk::from(citation);
                    }
                }
                Ok(ChatStreamEvent::Other { kind }) => {
                    tracing::trace!(kind = %kind, "Ignoring stream event");
                }
                Err(e) if e.is_transport_closed() => {
                    metrics::counter!("docqa_stream_transport_closed_total").increment(1);
                    tracing::warn!(
                        error = %e,
                        emitted,
                        "Model stream closed by transport; ending answer"
                    );
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, emitted, "Model stream failed; ending answer");
                    return;
                }
            }
        }

        tracing::debug!(emitted, "Answer stream finished");
    })
}

/// Citation for the first source, if it names a sent document
fn resolve_citation(
    documents: &[GroundingDocument],
    sources: &[CitationSource],
) -> Option<Citation> {
    let source = sources.first()?;
    match documents.iter().find(|doc| doc.id == source.id) {
        Some(doc) => Some(doc.citation()),
        None => {
            tracing::warn!(source_id = %source.id, "Dropping citation to unknown document");
            None
        }
    }
}

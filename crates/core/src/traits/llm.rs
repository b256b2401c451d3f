//! Hosted model traits

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::{ChatRequest, ChatResponse, ChatStreamEvent, EmbedInputType, RerankHit, Result};

/// Stream of chat events; ends when the model finishes or the transport closes
pub type ChatEventStream = Pin<Box<dyn Stream<Item = Result<ChatStreamEvent>> + Send>>;

/// Chat model interface
///
/// # Example
///
/// ```ignore
/// let model: Arc<dyn ChatModel> = Arc::new(CohereClient::new(config)?);
/// let request = ChatRequest::new(vec![ChatMessage::user("What is the refund policy?")])
///     .with_documents(documents);
/// let response = model.chat(request).await?;
/// println!("{}", response.first_text());
/// ```
#[async_trait]
pub trait ChatModel: Send + Sync + 'static {
    /// Non-streamed chat; may return tool calls instead of text
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Open a streamed chat
    ///
    /// Errors that happen before the stream is established are returned
    /// directly. Failures after that surface as items of the stream.
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatEventStream>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}

/// Embedding model interface
#[async_trait]
pub trait Embedder: Send + Sync + 'static {
    /// Embed `texts`, returning one vector per input in input order
    async fn embed(&self, texts: &[String], input_type: EmbedInputType) -> Result<Vec<Vec<f32>>>;
}

/// Reranking model interface
#[async_trait]
pub trait Reranker: Send + Sync + 'static {
    /// Score `documents` against `query`, best first, at most `top_n` hits
    async fn rerank(&self, query: &str, documents: &[String], top_n: usize)
        -> Result<Vec<RerankHit>>;
}

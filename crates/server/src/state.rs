//! Application State
//!
//! Hosted-model clients and the vector store are built once at startup and
//! composed here into the answer pipeline and the ingestor shared by every
//! handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use docqa_config::{Settings, StreamVariant};
use docqa_core::{ChatModel, Embedder, Reranker, VectorStore};
use docqa_rag::{
    AnswerGenerator, AnswerPipeline, ChunkConfig, DocumentReranker, Ingestor, MarkdownChunker,
    QueryExpander, Retriever, RetrieverConfig,
};
use metrics_exporter_prometheus::PrometheusHandle;

/// The hosted models the service talks to
#[derive(Clone)]
pub struct ModelClients {
    /// Expansion and batch generation
    pub chat: Arc<dyn ChatModel>,
    /// Alternative deployment for streamed answers
    pub chat_plus: Arc<dyn ChatModel>,
    pub embedder: Arc<dyn Embedder>,
    pub reranker: Arc<dyn Reranker>,
}

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub pipeline: Arc<AnswerPipeline>,
    pub ingestor: Arc<Ingestor>,
    pub store: Arc<dyn VectorStore>,
    /// Set once `ensure_collection` has succeeded
    collection_prepared: Arc<AtomicBool>,
    /// Present when the Prometheus recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire the pipeline and ingestor from their collaborators
    pub fn new(config: Settings, clients: ModelClients, store: Arc<dyn VectorStore>) -> Self {
        let stream_chat = match config.generation.stream_variant {
            StreamVariant::Chat => clients.chat.clone(),
            StreamVariant::ChatPlus => clients.chat_plus.clone(),
        };

        let retriever = Retriever::new(
            QueryExpander::new(clients.chat.clone()),
            clients.embedder.clone(),
            store.clone(),
            RetrieverConfig::from(&config.retrieval),
        );
        let reranker = DocumentReranker::new(clients.reranker, config.retrieval.rerank_top_n);
        let generator =
            AnswerGenerator::new(clients.chat, stream_chat, config.generation.citation_mode);

        let ingestor = Ingestor::new(
            clients.embedder,
            store.clone(),
            MarkdownChunker::new(ChunkConfig::from(&config.ingestion)),
            config.ingestion.embed_batch_size,
        );

        Self {
            config: Arc::new(config),
            pipeline: Arc::new(AnswerPipeline::new(retriever, reranker, generator)),
            ingestor: Arc::new(ingestor),
            store,
            collection_prepared: Arc::new(AtomicBool::new(false)),
            metrics: None,
        }
    }

    /// Whether the store can serve requests
    ///
    /// When collection setup is enabled it is retried on every check until it
    /// succeeds once, so a store that was down at startup becomes usable
    /// without a restart.
    pub async fn store_ready(&self) -> bool {
        if !self.store.is_ready().await {
            return false;
        }
        if !self.config.vector_store.ensure_collection
            || self.collection_prepared.load(Ordering::Acquire)
        {
            return true;
        }

        match self.store.ensure_collection().await {
            Ok(()) => {
                self.collection_prepared.store(true, Ordering::Release);
                tracing::info!(
                    collection = %self.config.vector_store.collection,
                    "Vector store collection ready"
                );
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to prepare vector store collection");
                false
            }
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

//! Integration tests for the answer pipeline (expand -> retrieve -> rerank -> generate)
//!
//! Every collaborator is an in-memory mock that records its calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio::sync::Barrier;
use tokio::time::timeout;

use docqa_core::{
    AnswerChunk, ChatEventStream, ChatModel, ChatRequest, ChatResponse, ChatStreamEvent, Chunk,
    CitationMode, CitationSource, EmbedInputType, Embedder, Error, InsertOutcome, ModelCitation,
    Question, RerankHit, Reranker, Result, StoredChunk, ToolCall, VectorStore,
};
use docqa_rag::{
    AnswerGenerator, AnswerPipeline, DocumentReranker, QueryExpander, RagError, Retriever,
    RetrieverConfig,
};

// =============================================================================
// Mocks
// =============================================================================

#[derive(Default)]
struct MockChat {
    /// Tool-call arguments returned to expansion requests, one call each
    tool_arguments: Vec<String>,
    answer: ChatResponse,
    stream: Mutex<Vec<Result<ChatStreamEvent>>>,
    /// When set, the stream stays open after its events and flips this flag when dropped
    stream_closed: Option<Arc<AtomicBool>>,
    requests: Mutex<Vec<ChatRequest>>,
}

/// Sets its flag when dropped
struct CloseFlag(Arc<AtomicBool>);

impl Drop for CloseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl MockChat {
    fn expanding(queries: &[&[&str]]) -> Self {
        Self {
            tool_arguments: queries
                .iter()
                .map(|q| serde_json::json!({ "queries": q }).to_string())
                .collect(),
            ..Default::default()
        }
    }

    fn generation_requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.tools.is_empty())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChatModel for MockChat {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let expanding = !request.tools.is_empty();
        self.requests.lock().unwrap().push(request);

        if expanding {
            let tool_calls = self
                .tool_arguments
                .iter()
                .enumerate()
                .map(|(i, arguments)| ToolCall {
                    id: format!("call_{i}"),
                    name: "database_search".to_string(),
                    arguments: arguments.clone(),
                })
                .collect();
            return Ok(ChatResponse {
                tool_calls,
                ..Default::default()
            });
        }
        Ok(self.answer.clone())
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatEventStream> {
        self.requests.lock().unwrap().push(request);
        let events = std::mem::take(&mut *self.stream.lock().unwrap());
        match &self.stream_closed {
            Some(flag) => {
                let guard = CloseFlag(flag.clone());
                let open_ended = stream::iter(events).chain(stream::pending());
                Ok(Box::pin(open_ended.map(move |event| {
                    let _held = &guard;
                    event
                })))
            }
            None => Ok(Box::pin(stream::iter(events))),
        }
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}

#[derive(Default)]
struct MockEmbedder {
    calls: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, texts: &[String], input_type: EmbedInputType) -> Result<Vec<Vec<f32>>> {
        assert_eq!(input_type, EmbedInputType::SearchQuery);
        self.calls.lock().unwrap().push(texts.to_vec());
        Ok(texts.iter().map(|t| vec![t.len() as f32; 4]).collect())
    }
}

#[derive(Default)]
struct MockStore {
    hits: HashMap<String, Vec<Chunk>>,
    fail_on: Option<String>,
    /// Every search waits here, so sequential searches would never finish
    barrier: Option<Arc<Barrier>>,
    searches: Mutex<Vec<(String, usize)>>,
}

impl MockStore {
    fn with_hits(hits: &[(&str, Vec<Chunk>)]) -> Self {
        Self {
            hits: hits
                .iter()
                .map(|(q, chunks)| (q.to_string(), chunks.clone()))
                .collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl VectorStore for MockStore {
    async fn is_ready(&self) -> bool {
        true
    }

    async fn hybrid_search(&self, text: &str, _vector: &[f32], limit: usize) -> Result<Vec<Chunk>> {
        self.searches.lock().unwrap().push((text.to_string(), limit));
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if self.fail_on.as_deref() == Some(text) {
            return Err(Error::Retrieval("search backend down".to_string()));
        }

        let mut chunks = self.hits.get(text).cloned().unwrap_or_default();
        chunks.truncate(limit);
        Ok(chunks)
    }

    async fn insert_many(&self, chunks: Vec<StoredChunk>) -> Result<InsertOutcome> {
        Ok(InsertOutcome {
            inserted: chunks.len(),
            has_errors: false,
        })
    }
}

/// Scores candidates from a fixed table keyed by content
#[derive(Default)]
struct MockReranker {
    scores: HashMap<String, f32>,
    calls: Mutex<usize>,
}

#[async_trait]
impl Reranker for MockReranker {
    async fn rerank(
        &self,
        _query: &str,
        documents: &[String],
        _top_n: usize,
    ) -> Result<Vec<RerankHit>> {
        *self.calls.lock().unwrap() += 1;
        // Returned unsorted and untruncated
        Ok(documents
            .iter()
            .enumerate()
            .map(|(index, doc)| RerankHit {
                index,
                relevance_score: self.scores.get(doc).copied().unwrap_or(0.0),
            })
            .collect())
    }
}

struct Harness {
    chat: Arc<MockChat>,
    embedder: Arc<MockEmbedder>,
    store: Arc<MockStore>,
    reranker: Arc<MockReranker>,
}

impl Harness {
    fn new(chat: MockChat, store: MockStore, reranker: MockReranker) -> Self {
        Self {
            chat: Arc::new(chat),
            embedder: Arc::new(MockEmbedder::default()),
            store: Arc::new(store),
            reranker: Arc::new(reranker),
        }
    }

    fn retriever(&self) -> Retriever {
        Retriever::new(
            QueryExpander::new(self.chat.clone()),
            self.embedder.clone(),
            self.store.clone(),
            RetrieverConfig::default(),
        )
    }

    fn pipeline(&self, top_n: usize) -> AnswerPipeline {
        AnswerPipeline::new(
            self.retriever(),
            DocumentReranker::new(self.reranker.clone(), top_n),
            AnswerGenerator::new(self.chat.clone(), self.chat.clone(), CitationMode::Fast),
        )
    }

    fn embed_calls(&self) -> Vec<Vec<String>> {
        self.embedder.calls.lock().unwrap().clone()
    }

    fn searches(&self) -> Vec<(String, usize)> {
        self.store.searches.lock().unwrap().clone()
    }

    fn rerank_calls(&self) -> usize {
        *self.reranker.calls.lock().unwrap()
    }
}

fn chunk(title: &str) -> Chunk {
    Chunk::new(title, format!("{title} content"))
}

fn titles(chunks: &[Chunk]) -> Vec<&str> {
    chunks.iter().map(|c| c.title.as_str()).collect()
}

fn cited(ids: &[&str]) -> ModelCitation {
    ModelCitation {
        start: 0,
        end: 4,
        text: "cite".to_string(),
        sources: ids
            .iter()
            .map(|id| CitationSource {
                id: id.to_string(),
                ..Default::default()
            })
            .collect(),
    }
}

// =============================================================================
// Retrieval
// =============================================================================

#[tokio::test]
async fn test_direct_retrieval_single_search_in_store_order() {
    let question = "What is the refund policy?";
    let harness = Harness::new(
        MockChat::default(),
        MockStore::with_hits(&[(question, vec![chunk("C"), chunk("A"), chunk("B")])]),
        MockReranker::default(),
    );

    let chunks = harness.retriever().retrieve_direct(question).await.unwrap();

    assert_eq!(titles(&chunks), vec!["C", "A", "B"]);
    assert_eq!(harness.embed_calls(), vec![vec![question.to_string()]]);
    assert_eq!(harness.searches(), vec![(question.to_string(), 5)]);
    // No expansion on the direct path
    assert!(harness.chat.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_expanded_retrieval_runs_searches_concurrently() {
    let store = MockStore {
        barrier: Some(Arc::new(Barrier::new(3))),
        ..MockStore::with_hits(&[
            ("refunds", vec![chunk("r1"), chunk("r2")]),
            ("returns window", vec![chunk("w1")]),
            ("exchanges", vec![chunk("e1"), chunk("e2")]),
        ])
    };
    let harness = Harness::new(
        MockChat::expanding(&[&["refunds", "returns window"], &["exchanges"]]),
        store,
        MockReranker::default(),
    );

    let chunks = timeout(
        Duration::from_secs(5),
        harness.retriever().retrieve_expanded("Can I return or exchange?"),
    )
    .await
    .expect("searches did not run concurrently")
    .unwrap();

    // Grouped by query index, then store order
    assert_eq!(titles(&chunks), vec!["r1", "r2", "w1", "e1", "e2"]);
    assert_eq!(harness.searches().len(), 3);
    // All queries embedded in one call
    assert_eq!(
        harness.embed_calls(),
        vec![vec![
            "refunds".to_string(),
            "returns window".to_string(),
            "exchanges".to_string()
        ]]
    );
}

#[tokio::test]
async fn test_bounded_fanout_preserves_order() {
    let harness = Harness::new(
        MockChat::default(),
        MockStore::with_hits(&[
            ("a", vec![chunk("a1")]),
            ("b", vec![chunk("b1"), chunk("b2")]),
            ("c", vec![chunk("c1")]),
        ]),
        MockReranker::default(),
    );
    let retriever = Retriever::new(
        QueryExpander::new(harness.chat.clone()),
        harness.embedder.clone(),
        harness.store.clone(),
        RetrieverConfig {
            search_limit: 5,
            max_concurrent_searches: 1,
        },
    );

    let queries = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let chunks = retriever.search_all(&queries).await.unwrap();

    assert_eq!(titles(&chunks), vec!["a1", "b1", "b2", "c1"]);
}

#[tokio::test]
async fn test_search_failure_aborts_request() {
    let store = MockStore {
        fail_on: Some("exchanges".to_string()),
        ..MockStore::with_hits(&[("refunds", vec![chunk("r1")])])
    };
    let harness = Harness::new(
        MockChat::expanding(&[&["refunds", "exchanges"]]),
        store,
        MockReranker::default(),
    );

    let result = harness
        .pipeline(3)
        .answer_batch(&Question::new("returns?", true))
        .await;

    let err: Error = result.unwrap_err().into();
    assert!(matches!(err, Error::Retrieval(_)));
    assert_eq!(harness.rerank_calls(), 0);
    assert!(harness.chat.generation_requests().is_empty());
}

#[tokio::test]
async fn test_malformed_tool_arguments_fail_expansion() {
    let chat = MockChat {
        tool_arguments: vec![r#"{"query": "refunds"}"#.to_string()],
        ..Default::default()
    };
    let harness = Harness::new(chat, MockStore::default(), MockReranker::default());

    let result = harness.retriever().retrieve_expanded("refunds?").await;

    assert!(matches!(result, Err(RagError::MalformedToolOutput(_))));
    assert!(harness.searches().is_empty());
}

// =============================================================================
// Reranking
// =============================================================================

#[tokio::test]
async fn test_rerank_truncates_in_score_order() {
    let reranker = MockReranker {
        scores: [
            ("q0 content", 0.2),
            ("q1 content", 0.5),
            ("q2 content", 0.7),
            ("q3 content", 0.9),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect(),
        ..Default::default()
    };
    let harness = Harness::new(
        MockChat::expanding(&[&["first", "second"]]),
        MockStore::with_hits(&[
            ("first", vec![chunk("q0"), chunk("q1")]),
            ("second", vec![chunk("q2"), chunk("q3")]),
        ]),
        reranker,
    );

    let documents = harness
        .pipeline(3)
        .documents(&Question::new("policy?", true))
        .await
        .unwrap();

    let ranked: Vec<(&str, &str)> = documents
        .iter()
        .map(|d| (d.id.as_str(), d.title.as_str()))
        .collect();
    assert_eq!(ranked, vec![("0", "q3"), ("1", "q2"), ("2", "q1")]);
    assert_eq!(harness.rerank_calls(), 1);
}

#[tokio::test]
async fn test_zero_queries_skip_rerank() {
    let chat = MockChat {
        answer: ChatResponse {
            content: vec!["I could not find anything.".to_string()],
            ..Default::default()
        },
        ..Default::default()
    };
    let harness = Harness::new(chat, MockStore::default(), MockReranker::default());

    let answer = harness
        .pipeline(3)
        .answer_batch(&Question::new("hello", true))
        .await
        .unwrap();

    assert_eq!(harness.rerank_calls(), 0);
    assert!(harness.embed_calls().is_empty());
    assert!(harness.searches().is_empty());
    assert!(answer.citations.is_empty());

    let generation = harness.chat.generation_requests();
    assert_eq!(generation.len(), 1);
    assert!(generation[0].documents.is_empty());
}

// =============================================================================
// Generation
// =============================================================================

#[tokio::test]
async fn test_refund_question_end_to_end() {
    let question = "What is the refund policy?";
    let store_hits: Vec<Chunk> = (0..7).map(|i| chunk(&format!("Policy {i}"))).collect();
    let chat = MockChat {
        answer: ChatResponse {
            content: vec!["Refunds are accepted within 30 days.".to_string()],
            citations: vec![cited(&["0"]), cited(&["2", "1"])],
            ..Default::default()
        },
        ..Default::default()
    };
    let harness = Harness::new(
        chat,
        MockStore::with_hits(&[(question, store_hits)]),
        MockReranker::default(),
    );

    let answer = harness
        .pipeline(3)
        .answer_batch(&Question::new(question, false))
        .await
        .unwrap();

    assert_eq!(harness.embed_calls().len(), 1);
    assert_eq!(harness.searches(), vec![(question.to_string(), 5)]);
    assert_eq!(harness.rerank_calls(), 0);

    let generation = harness.chat.generation_requests();
    assert_eq!(generation.len(), 1);
    let documents = &generation[0].documents;
    assert!(documents.len() <= 5);
    // Batch generation leaves the citation mode to the model default
    assert_eq!(generation[0].citation_mode, None);

    assert!(!answer.answer.is_empty());
    assert_eq!(answer.citations.len(), 2);
    assert_eq!(answer.citations[0].title, "Policy 0");
    // First source only
    assert_eq!(answer.citations[1].title, "Policy 2");
    for citation in &answer.citations {
        assert!(documents
            .iter()
            .any(|d| d.title == citation.title && d.text == citation.text));
    }
}

#[tokio::test]
async fn test_batch_drops_orphan_citations() {
    let question = "shipping?";
    let chat = MockChat {
        answer: ChatResponse {
            content: vec!["Free over $50.".to_string()],
            citations: vec![cited(&["9"]), cited(&["1"]), cited(&[])],
            ..Default::default()
        },
        ..Default::default()
    };
    let harness = Harness::new(
        chat,
        MockStore::with_hits(&[(question, vec![chunk("A"), chunk("B")])]),
        MockReranker::default(),
    );

    let answer = harness
        .pipeline(3)
        .answer_batch(&Question::new(question, false))
        .await
        .unwrap();

    assert_eq!(answer.citations.len(), 1);
    assert_eq!(answer.citations[0].title, "B");
    assert_eq!(answer.citations[0].text, "B content");
}

#[tokio::test]
async fn test_stream_interleaves_text_and_citations() {
    let question = "refunds?";
    let chat = MockChat {
        stream: Mutex::new(vec![
            Ok(ChatStreamEvent::Other {
                kind: "message-start".to_string(),
            }),
            Ok(ChatStreamEvent::ContentDelta {
                text: "A".to_string(),
            }),
            Ok(ChatStreamEvent::CitationStart {
                sources: vec![CitationSource {
                    id: "0".to_string(),
                    ..Default::default()
                }],
            }),
            Ok(ChatStreamEvent::ContentDelta {
                text: "B".to_string(),
            }),
            Ok(ChatStreamEvent::Other {
                kind: "message-end".to_string(),
            }),
        ]),
        ..Default::default()
    };
    let harness = Harness::new(
        chat,
        MockStore::with_hits(&[(question, vec![chunk("Refunds")])]),
        MockReranker::default(),
    );

    let output: Vec<AnswerChunk> = harness
        .pipeline(3)
        .answer_stream(&Question::new(question, false))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(
        output,
        vec![
            AnswerChunk::ResponseChunk {
                text: "A".to_string()
            },
            AnswerChunk::Citation {
                title: "Refunds".to_string(),
                text: "Refunds content".to_string()
            },
            AnswerChunk::ResponseChunk {
                text: "B".to_string()
            },
        ]
    );

    let requests = harness.chat.requests.lock().unwrap();
    assert_eq!(requests[0].citation_mode, Some(CitationMode::Fast));
}

#[tokio::test]
async fn test_stream_ends_silently_on_transport_close() {
    let question = "refunds?";
    let chat = MockChat {
        stream: Mutex::new(vec![
            Ok(ChatStreamEvent::ContentDelta {
                text: "Refunds are".to_string(),
            }),
            Err(Error::TransportClosed("connection reset".to_string())),
            Ok(ChatStreamEvent::ContentDelta {
                text: " never seen".to_string(),
            }),
        ]),
        ..Default::default()
    };
    let harness = Harness::new(
        chat,
        MockStore::with_hits(&[(question, vec![chunk("Refunds")])]),
        MockReranker::default(),
    );

    let output: Vec<AnswerChunk> = harness
        .pipeline(3)
        .answer_stream(&Question::new(question, false))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(
        output,
        vec![AnswerChunk::ResponseChunk {
            text: "Refunds are".to_string()
        }]
    );
}

#[tokio::test]
async fn test_dropping_answer_stream_closes_model_stream() {
    let question = "refunds?";
    let closed = Arc::new(AtomicBool::new(false));
    let chat = MockChat {
        stream: Mutex::new(vec![
            Ok(ChatStreamEvent::ContentDelta {
                text: "Refunds".to_string(),
            }),
            Ok(ChatStreamEvent::ContentDelta {
                text: " are".to_string(),
            }),
        ]),
        stream_closed: Some(closed.clone()),
        ..Default::default()
    };
    let harness = Harness::new(
        chat,
        MockStore::with_hits(&[(question, vec![chunk("Refunds")])]),
        MockReranker::default(),
    );

    let mut answer = harness
        .pipeline(3)
        .answer_stream(&Question::new(question, false))
        .await
        .unwrap();

    let first = timeout(Duration::from_secs(5), answer.next())
        .await
        .expect("first chunk");
    assert_eq!(
        first,
        Some(AnswerChunk::ResponseChunk {
            text: "Refunds".to_string()
        })
    );
    assert!(!closed.load(Ordering::SeqCst));

    // Client went away mid-answer
    drop(answer);
    assert!(closed.load(Ordering::SeqCst));
}

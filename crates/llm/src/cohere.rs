//! Cohere v2 API client
//!
//! One client type serves every hosted model role: construct it once per
//! configured `ModelEndpoint` and use it as `ChatModel`, `Embedder` or
//! `Reranker`.

use std::time::Duration;

use async_trait::async_trait;
use docqa_config::ModelEndpoint;
use docqa_core::{
    ChatEventStream, ChatModel, ChatRequest, ChatResponse, CitationSource, EmbedInputType,
    Embedder, Error, ModelCitation, RerankHit, Reranker, Result, Role, ToolCall,
};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::streaming::chat_event_stream;
use crate::LlmError;

/// Cohere API client bound to one model
pub struct CohereClient {
    config: ModelEndpoint,
    client: Client,
}

impl CohereClient {
    /// Create a new client
    pub fn new(config: ModelEndpoint) -> std::result::Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::Configuration(format!(
                "API key for model '{}' not set. Set it via COHERE_API_KEY or config.",
                config.model
            )));
        }

        // Idle limit only; a total deadline would cut off long streams.
        // Unary calls get their deadline per request.
        let timeout = Duration::from_secs(config.timeout_seconds);
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    /// POST a JSON body; `deadline` bounds the whole exchange when set
    async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        deadline: Option<Duration>,
    ) -> std::result::Result<reqwest::Response, LlmError> {
        let mut request = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.config.api_key)
            .header("content-type", "application/json")
            .json(body);
        if let Some(deadline) = deadline {
            request = request.timeout(deadline);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    fn chat_body<'a>(&'a self, request: &'a ChatRequest, stream: bool) -> ChatBody<'a> {
        ChatBody {
            model: &self.config.model,
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
            tools: request
                .tools
                .iter()
                .map(|t| WireTool {
                    kind: "function",
                    function: WireFunction {
                        name: &t.name,
                        description: &t.description,
                        parameters: &t.parameters,
                    },
                })
                .collect(),
            documents: request
                .documents
                .iter()
                .map(|d| WireDocument {
                    id: &d.id,
                    data: WireDocumentData {
                        title: &d.title,
                        text: &d.text,
                    },
                })
                .collect(),
            citation_options: request.citation_mode.map(|mode| WireCitationOptions {
                mode: mode.as_api_str(),
            }),
            stream,
        }
    }

    async fn chat_raw(&self, request: &ChatRequest) -> std::result::Result<ChatResponse, LlmError> {
        let response = self
            .post(
                "/v2/chat",
                &self.chat_body(request, false),
                Some(self.request_timeout()),
            )
            .await?;
        let response: ChatApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(response.into())
    }

    async fn embed_raw(
        &self,
        texts: &[String],
        input_type: EmbedInputType,
    ) -> std::result::Result<Vec<Vec<f32>>, LlmError> {
        let body = EmbedBody {
            model: &self.config.model,
            texts,
            input_type,
            embedding_types: &["float"],
        };

        let response: EmbedApiResponse = self
            .post("/v2/embed", &body, Some(self.request_timeout()))
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let vectors = response.embeddings.float;
        if vectors.len() != texts.len() {
            return Err(LlmError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    async fn rerank_raw(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> std::result::Result<Vec<RerankHit>, LlmError> {
        let body = RerankBody {
            model: &self.config.model,
            query,
            documents,
            top_n,
        };

        let response: RerankApiResponse = self
            .post("/v2/rerank", &body, Some(self.request_timeout()))
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(response.results)
    }
}

#[async_trait]
impl ChatModel for CohereClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        tracing::debug!(
            model = %self.config.model,
            documents = request.documents.len(),
            tools = request.tools.len(),
            "Chat request"
        );
        Ok(self.chat_raw(&request).await?)
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatEventStream> {
        tracing::debug!(
            model = %self.config.model,
            documents = request.documents.len(),
            "Opening chat stream"
        );
        let response = self
            .post("/v2/chat", &self.chat_body(&request, true), None)
            .await?;

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| LlmError::StreamInterrupted(e.to_string())));
        Ok(chat_event_stream(body))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl Embedder for CohereClient {
    async fn embed(&self, texts: &[String], input_type: EmbedInputType) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_raw(texts, input_type)
            .await
            .map_err(|e| Error::Embedding(e.to_string()))
    }
}

#[async_trait]
impl Reranker for CohereClient {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>> {
        self.rerank_raw(query, documents, top_n)
            .await
            .map_err(|e| Error::Rerank(e.to_string()))
    }
}

// =============================================================================
// Cohere API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    documents: Vec<WireDocument<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    citation_options: Option<WireCitationOptions>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct WireDocument<'a> {
    id: &'a str,
    data: WireDocumentData<'a>,
}

#[derive(Debug, Serialize)]
struct WireDocumentData<'a> {
    title: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct WireCitationOptions {
    mode: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatApiResponse {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Vec<ApiContent>,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
    #[serde(default)]
    citations: Vec<ApiCitation>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    function: ApiFunction,
}

#[derive(Debug, Deserialize)]
struct ApiFunction {
    name: String,
    /// Usually a JSON-encoded string; tolerated as an inline object
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiCitation {
    #[serde(default)]
    start: usize,
    #[serde(default)]
    end: usize,
    #[serde(default)]
    text: String,
    #[serde(default)]
    pub(crate) sources: Vec<ApiSource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiSource {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    document: Option<ApiSourceDocument>,
}

#[derive(Debug, Deserialize)]
struct ApiSourceDocument {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl From<ApiSource> for CitationSource {
    fn from(source: ApiSource) -> Self {
        let (doc_id, title, text) = match source.document {
            Some(doc) => (doc.id, doc.title, doc.text),
            None => (None, None, None),
        };
        CitationSource {
            id: source.id.or(doc_id).unwrap_or_default(),
            title,
            text,
        }
    }
}

impl From<ApiCitation> for ModelCitation {
    fn from(citation: ApiCitation) -> Self {
        ModelCitation {
            start: citation.start,
            end: citation.end,
            text: citation.text,
            sources: citation.sources.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<ChatApiResponse> for ChatResponse {
    fn from(response: ChatApiResponse) -> Self {
        let message = response.message;
        ChatResponse {
            content: message
                .content
                .into_iter()
                .filter_map(|c| match c {
                    ApiContent::Text { text } => Some(text),
                    ApiContent::Other => None,
                })
                .collect(),
            tool_calls: message
                .tool_calls
                .into_iter()
                .map(|tc| ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments: match tc.function.arguments {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    },
                })
                .collect(),
            citations: message.citations.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedBody<'a> {
    model: &'a str,
    texts: &'a [String],
    input_type: EmbedInputType,
    embedding_types: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbedApiResponse {
    embeddings: EmbedVectors,
}

#[derive(Debug, Deserialize)]
struct EmbedVectors {
    #[serde(default)]
    float: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct RerankBody<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankApiResponse {
    results: Vec<RerankHit>,
}

//! Hosted model request/response types
//!
//! Provider-neutral shapes for chat (with tools and grounding documents),
//! streamed chat events, embeddings and reranking.

use serde::{Deserialize, Serialize};

use crate::document::GroundingDocument;

/// Chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A function the model may call instead of answering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

/// A tool invocation requested by the model
///
/// `arguments` is the raw JSON text produced by the model; callers parse it
/// against their own schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Citation granularity/latency trade-off for grounded generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationMode {
    /// Emit citations inline with the text as early as possible
    #[default]
    Fast,
    /// Emit citations after the text with higher precision
    Accurate,
}

impl CitationMode {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            CitationMode::Fast => "FAST",
            CitationMode::Accurate => "ACCURATE",
        }
    }
}

/// Chat request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub documents: Vec<GroundingDocument>,
    pub citation_mode: Option<CitationMode>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_documents(mut self, documents: Vec<GroundingDocument>) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_citation_mode(mut self, mode: CitationMode) -> Self {
        self.citation_mode = Some(mode);
        self
    }
}

/// One document referenced by a citation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationSource {
    /// Id of the grounding document as sent in the request
    pub id: String,
    /// Title echoed back by the model, if any
    #[serde(default)]
    pub title: Option<String>,
    /// Text echoed back by the model, if any
    #[serde(default)]
    pub text: Option<String>,
}

/// A citation span in a generated answer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCitation {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub sources: Vec<CitationSource>,
}

/// Non-streamed chat response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatResponse {
    /// Text content blocks in order
    pub content: Vec<String>,
    pub tool_calls: Vec<ToolCall>,
    pub citations: Vec<ModelCitation>,
}

impl ChatResponse {
    /// Text of the first content block, empty if the model produced none.
    pub fn first_text(&self) -> &str {
        self.content.first().map(String::as_str).unwrap_or_default()
    }
}

/// Event of a streamed chat response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatStreamEvent {
    ContentDelta { text: String },
    CitationStart { sources: Vec<CitationSource> },
    /// Any other event type; carried for logging only
    Other { kind: String },
}

/// Purpose of an embedding request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedInputType {
    SearchQuery,
    SearchDocument,
}

/// One rerank result: index into the submitted documents plus its score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankHit {
    pub index: usize,
    pub relevance_score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_text() {
        let response = ChatResponse::default();
        assert_eq!(response.first_text(), "");

        let response = ChatResponse {
            content: vec!["first".to_string(), "second".to_string()],
            ..Default::default()
        };
        assert_eq!(response.first_text(), "first");
    }

    #[test]
    fn test_citation_mode() {
        assert_eq!(CitationMode::default(), CitationMode::Fast);
        assert_eq!(CitationMode::Accurate.as_api_str(), "ACCURATE");
        let mode: CitationMode = serde_json::from_str(r#""accurate""#).unwrap();
        assert_eq!(mode, CitationMode::Accurate);
    }
}

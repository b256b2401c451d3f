//! Query expansion through tool calling
//!
//! The chat model is given the `database_search` tool and an instruction to
//! decompose the question. Tool-call arguments are parsed against a strict
//! schema; anything else fails the expansion.

use std::sync::Arc;

use docqa_core::{ChatMessage, ChatModel, ChatRequest, ToolCall};
use docqa_llm::tools::{database_search_tool, DATABASE_SEARCH_TOOL, QUERY_GENERATION_INSTRUCTION};
use serde::Deserialize;

use crate::RagError;

#[derive(Debug, Deserialize)]
struct DatabaseSearchArgs {
    queries: Vec<String>,
}

/// Turns one question into zero or more search queries
pub struct QueryExpander {
    chat: Arc<dyn ChatModel>,
}

impl QueryExpander {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }

    /// Expand `question` into search queries
    ///
    /// Returns an empty list when the model makes no tool call.
    pub async fn expand(&self, question: &str) -> Result<Vec<String>, RagError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(QUERY_GENERATION_INSTRUCTION),
            ChatMessage::user(question),
        ])
        .with_tools(vec![database_search_tool()]);

        let response = self.chat.chat(request).await?;
        let queries = parse_search_queries(&response.tool_calls)?;

        tracing::debug!(
            tool_calls = response.tool_calls.len(),
            queries = queries.len(),
            "Expanded question"
        );
        Ok(queries)
    }
}

/// Concatenate the `queries` of every tool call, in call order
pub fn parse_search_queries(tool_calls: &[ToolCall]) -> Result<Vec<String>, RagError> {
    let mut queries = Vec::new();

    for call in tool_calls {
        if call.name != DATABASE_SEARCH_TOOL {
            return Err(RagError::MalformedToolOutput(format!(
                "unexpected tool call '{}'",
                call.name
            )));
        }

        let args: DatabaseSearchArgs = serde_json::from_str(&call.arguments).map_err(|e| {
            RagError::MalformedToolOutput(format!("{} arguments: {}", DATABASE_SEARCH_TOOL, e))
        })?;
        queries.extend(args.queries);
    }

    Ok(queries)
}

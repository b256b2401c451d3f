//! Tool definitions for query expansion

use docqa_core::ToolDefinition;
use serde_json::json;

/// Name of the search-query generation tool
pub const DATABASE_SEARCH_TOOL: &str = "database_search";

/// System instruction that asks the model to answer with search queries
pub const QUERY_GENERATION_INSTRUCTION: &str = "\
You write search queries for a document database. \
Given the user's question, call the database_search tool with a list of \
short, self-contained queries that together cover everything needed to \
answer it. Split compound questions into one query per sub-question and \
resolve pronouns into the entities they refer to. If the message does not \
need any information from the database, do not call the tool.";

/// The `database_search` tool: `{queries: array<string>}`
pub fn database_search_tool() -> ToolDefinition {
    ToolDefinition {
        name: DATABASE_SEARCH_TOOL.to_string(),
        description: "Search the document database with one or more queries.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "queries": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "a list of queries for similarity search in a database."
                }
            },
            "required": ["queries"]
        }),
    }
}

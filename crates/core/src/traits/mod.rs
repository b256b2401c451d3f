//! Collaborator traits for the document QA service
//!
//! Every external dependency of the answer pipeline sits behind one of
//! these traits so backends can be swapped and mocked in tests.
//!
//! ```text
//! Hosted models:
//!   - ChatModel: grounded chat, tool calling, streamed chat
//!   - Embedder: text -> dense vectors
//!   - Reranker: relevance ordering of candidate texts
//!
//! Storage:
//!   - VectorStore: hybrid lexical + vector search, batch inserts
//! ```

mod llm;
mod store;

pub use llm::{ChatEventStream, ChatModel, Embedder, Reranker};
pub use store::{InsertOutcome, VectorStore};

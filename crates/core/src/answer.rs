//! Question and answer types
//!
//! These are the shapes exchanged with HTTP callers.

use serde::{Deserialize, Serialize};

use crate::document::Citation;

/// A natural-language question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "question")]
    pub text: String,
    /// Expand the question into several searches and rerank the candidates
    #[serde(default)]
    pub rerank: bool,
}

impl Question {
    pub fn new(text: impl Into<String>, rerank: bool) -> Self {
        Self {
            text: text.into(),
            rerank,
        }
    }
}

/// Batch-mode result: answer text plus its citations in model order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

/// One event of a streamed answer
///
/// The end of the answer is signalled by the stream closing; there is no
/// terminal event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AnswerChunk {
    ResponseChunk { text: String },
    Citation { title: String, text: String },
}

impl From<Citation> for AnswerChunk {
    fn from(citation: Citation) -> Self {
        AnswerChunk::Citation {
            title: citation.title,
            text: citation.text,
        }
    }
}

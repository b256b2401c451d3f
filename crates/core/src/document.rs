//! Retrieved text and its provenance

use serde::{Deserialize, Serialize};

/// A unit of retrieved text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub title: String,
    pub content: String,
}

impl Chunk {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// A chunk promoted to generation context
///
/// `id` is the position of the document in the list handed to the model and
/// is the key citations are resolved against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingDocument {
    pub id: String,
    pub title: String,
    pub text: String,
}

impl GroundingDocument {
    /// Number a list of chunks `0..n` in order.
    pub fn from_chunks(chunks: impl IntoIterator<Item = Chunk>) -> Vec<Self> {
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| Self {
                id: i.to_string(),
                title: chunk.title,
                text: chunk.content,
            })
            .collect()
    }

    pub fn citation(&self) -> Citation {
        Citation::new(self.title.clone(), self.text.clone())
    }
}

/// A model-emitted reference to one grounding document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub text: String,
}

impl Citation {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}

/// A chunk ready to be written to the vector store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub filename: String,
    pub title: String,
    pub content: String,
    pub vector: Vec<f32>,
}

//! Vector Store using Qdrant
//!
//! Hybrid search runs two prefetches in one Query API call, a pure dense
//! nearest-neighbour search and the same search restricted to points whose
//! chunk text matches a keyword of the query, and fuses them with
//! reciprocal rank fusion.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use docqa_config::constants::vector_store::{FIELD_CONTENT, FIELD_FILENAME, FIELD_TITLE};
use docqa_config::VectorStoreConfig;
use docqa_core::{Chunk, InsertOutcome, Result, StoredChunk, VectorStore};
use qdrant_client::{
    qdrant::{
        value::Kind, Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
        Distance, FieldType, Filter, Fusion, PointStruct, PrefetchQueryBuilder, Query,
        QueryPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
    },
    Qdrant,
};

use crate::RagError;

/// Maximum keywords used for the lexical prefetch
const MAX_KEYWORDS: usize = 8;

/// Qdrant-backed document collection
pub struct QdrantStore {
    client: Qdrant,
    config: VectorStoreConfig,
}

impl QdrantStore {
    /// Create a new vector store connection
    ///
    /// The connection is lazy; use `is_ready` to probe the server.
    pub fn new(config: VectorStoreConfig) -> std::result::Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.endpoint);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
            tracing::info!("Qdrant connection using API key authentication");
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    /// Create the collection and the full-text index on chunk content if missing
    async fn create_collection_if_missing(&self) -> std::result::Result<(), RagError> {
        let exists = self
            .client
            .collection_exists(&self.config.collection)
            .await
            .map_err(|e| RagError::Connection(e.to_string()))?;

        if exists {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.config.collection).vectors_config(
                    VectorParamsBuilder::new(self.config.vector_dim, Distance::Cosine),
                ),
            )
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                &self.config.collection,
                FIELD_CONTENT,
                FieldType::Text,
            ))
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        tracing::info!(
            collection = %self.config.collection,
            vector_dim = self.config.vector_dim,
            "Created vector collection"
        );
        Ok(())
    }

    fn hybrid_query(&self, text: &str, vector: &[f32], limit: u64) -> QueryPointsBuilder {
        let mut builder = QueryPointsBuilder::new(&self.config.collection).add_prefetch(
            PrefetchQueryBuilder::default()
                .query(Query::new_nearest(vector.to_vec()))
                .limit(limit),
        );

        let keywords = extract_keywords(text);
        if !keywords.is_empty() {
            let conditions: Vec<Condition> = keywords
                .into_iter()
                .map(|k| Condition::matches_text(FIELD_CONTENT, k))
                .collect();
            builder = builder.add_prefetch(
                PrefetchQueryBuilder::default()
                    .query(Query::new_nearest(vector.to_vec()))
                    .filter(Filter::should(conditions))
                    .limit(limit),
            );
        }

        builder
            .query(Query::new_fusion(Fusion::Rrf))
            .limit(limit)
            .with_payload(true)
    }

    async fn search_raw(
        &self,
        text: &str,
        vector: &[f32],
        limit: usize,
    ) -> std::result::Result<Vec<Chunk>, RagError> {
        let response = self
            .client
            .query(self.hybrid_query(text, vector, limit as u64))
            .await
            .map_err(|e| RagError::Search(e.to_string()))?;

        let chunks = response
            .result
            .into_iter()
            .map(|point| {
                let mut title = String::new();
                let mut content = String::new();

                for (k, v) in point.payload {
                    if let Some(Kind::StringValue(s)) = v.kind {
                        match k.as_str() {
                            FIELD_TITLE => title = s,
                            FIELD_CONTENT => content = s,
                            _ => {}
                        }
                    }
                }

                Chunk::new(title, content)
            })
            .collect();

        Ok(chunks)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn is_ready(&self) -> bool {
        match self.client.health_check().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Qdrant health check failed");
                false
            }
        }
    }

    async fn ensure_collection(&self) -> Result<()> {
        Ok(self.create_collection_if_missing().await?)
    }

    async fn hybrid_search(&self, text: &str, vector: &[f32], limit: usize) -> Result<Vec<Chunk>> {
        Ok(self.search_raw(text, vector, limit).await?)
    }

    async fn insert_many(&self, chunks: Vec<StoredChunk>) -> Result<InsertOutcome> {
        let count = chunks.len();
        let points: Vec<PointStruct> = chunks
            .into_iter()
            .map(|chunk| {
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                payload.insert(FIELD_FILENAME.to_string(), chunk.filename.into());
                payload.insert(FIELD_TITLE.to_string(), chunk.title.into());
                payload.insert(FIELD_CONTENT.to_string(), chunk.content.into());

                PointStruct::new(uuid::Uuid::new_v4().to_string(), chunk.vector, payload)
            })
            .collect();

        match self
            .client
            .upsert_points(UpsertPointsBuilder::new(&self.config.collection, points).wait(true))
            .await
        {
            Ok(_) => Ok(InsertOutcome {
                inserted: count,
                has_errors: false,
            }),
            Err(e) => {
                tracing::error!(error = %e, points = count, "Qdrant upsert failed");
                Ok(InsertOutcome {
                    inserted: 0,
                    has_errors: true,
                })
            }
        }
    }
}

/// Extract keywords for the lexical half of hybrid search
pub fn extract_keywords(text: &str) -> Vec<String> {
    // Simple keyword extraction - filter stopwords
    let stopwords: HashSet<&str> = [
        "the", "a", "an", "is", "are", "was", "were", "be", "been", "i", "you", "we", "they",
        "it", "this", "that", "what", "which", "who", "whom", "whose", "to", "for", "in", "on",
        "at", "by", "with", "from", "and", "or", "but", "if", "then", "else", "how", "does",
        "can", "do", "about", "there", "their", "any", "our", "your", "its", "not",
    ]
    .into_iter()
    .collect();

    let mut seen = HashSet::new();
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2 && !stopwords.contains(w))
        .filter(|w| seen.insert(w.to_string()))
        .map(|w| w.to_string())
        .take(MAX_KEYWORDS)
        .collect()
}

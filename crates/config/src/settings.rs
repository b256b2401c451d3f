//! Main settings module

use std::path::Path;

use config::{Config, Environment, File};
use docqa_core::CitationMode;
use serde::{Deserialize, Serialize};

use crate::constants::{endpoints, ingestion, models, retrieval, server, vector_store};
use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Hosted model endpoints
    #[serde(default)]
    pub models: ModelsConfig,

    /// Vector store connection
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_models()?;
        self.validate_vector_store()?;
        self.validate_retrieval()?;
        self.validate_ingestion()?;

        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if self.server.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.request_timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        Ok(())
    }

    fn validate_models(&self) -> Result<(), ConfigError> {
        for (field, resolved) in [
            ("models.chat.endpoint", self.models.chat()),
            ("models.chat_plus.endpoint", self.models.chat_plus()),
            ("models.embed.endpoint", self.models.embed()),
            ("models.rerank.endpoint", self.models.rerank()),
        ] {
            let url = resolved.endpoint.trim();
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("Expected an http(s) URL, got '{}'", url),
                });
            }
        }

        Ok(())
    }

    fn validate_vector_store(&self) -> Result<(), ConfigError> {
        if self.vector_store.collection.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "vector_store.collection".to_string(),
                message: "Collection name cannot be empty".to_string(),
            });
        }

        if self.vector_store.vector_dim == 0 {
            return Err(ConfigError::InvalidValue {
                field: "vector_store.vector_dim".to_string(),
                message: "Vector dimension must be positive".to_string(),
            });
        }

        Ok(())
    }

    fn validate_retrieval(&self) -> Result<(), ConfigError> {
        if self.retrieval.search_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.search_limit".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if self.retrieval.rerank_top_n == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.rerank_top_n".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_ingestion(&self) -> Result<(), ConfigError> {
        let ingestion = &self.ingestion;

        if ingestion.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingestion.chunk_size".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if ingestion.chunk_overlap >= ingestion.chunk_size {
            return Err(ConfigError::InvalidValue {
                field: "ingestion.chunk_overlap".to_string(),
                message: format!(
                    "Overlap ({}) must be smaller than chunk_size ({})",
                    ingestion.chunk_overlap, ingestion.chunk_size
                ),
            });
        }

        if ingestion.embed_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingestion.embed_batch_size".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if !(1..=6).contains(&ingestion.max_header_level) {
            return Err(ConfigError::InvalidValue {
                field: "ingestion.max_header_level".to_string(),
                message: format!("Must be between 1 and 6, got {}", ingestion.max_header_level),
            });
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins; `*` allows any
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Timeout for unary requests
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Body limit for uploads
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    server::HOST.to_string()
}
fn default_port() -> u16 {
    server::PORT
}
fn default_true() -> bool {
    true
}
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}
fn default_request_timeout() -> u64 {
    server::REQUEST_TIMEOUT_SECS
}
fn default_max_upload_bytes() -> usize {
    server::MAX_UPLOAD_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            request_timeout_seconds: default_request_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// One hosted model: where it lives, how to authenticate, which model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelEndpoint {
    #[serde(default)]
    pub endpoint: String,

    /// Bearer token (set via DOCQA__MODELS__CHAT__API_KEY)
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub model: String,

    #[serde(default = "default_model_timeout")]
    pub timeout_seconds: u64,
}

impl ModelEndpoint {
    fn with_model(model: &str) -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model: model.to_string(),
            timeout_seconds: default_model_timeout(),
        }
    }

    /// Fill empty fields from `fallback`
    pub fn or_fallback(&self, fallback: &ModelEndpoint) -> ModelEndpoint {
        let mut resolved = self.clone();
        if resolved.endpoint.trim().is_empty() {
            resolved.endpoint = fallback.endpoint.clone();
        }
        if resolved.api_key.is_empty() {
            resolved.api_key = fallback.api_key.clone();
        }
        if resolved.model.trim().is_empty() {
            resolved.model = fallback.model.clone();
        }
        resolved
    }
}

fn default_model_timeout() -> u64 {
    models::REQUEST_TIMEOUT_SECS
}

/// Hosted model configuration
///
/// `chat_plus`, `embed` and `rerank` inherit the endpoint and key of `chat`
/// when left empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_chat")]
    pub chat: ModelEndpoint,

    /// Alternate chat deployment used for accurate-citation streaming
    #[serde(default = "default_chat_plus")]
    pub chat_plus: ModelEndpoint,

    #[serde(default = "default_embed")]
    pub embed: ModelEndpoint,

    #[serde(default = "default_rerank")]
    pub rerank: ModelEndpoint,
}

fn default_chat() -> ModelEndpoint {
    ModelEndpoint {
        endpoint: endpoints::MODEL_API_DEFAULT.to_string(),
        api_key: std::env::var("COHERE_API_KEY").unwrap_or_default(),
        ..ModelEndpoint::with_model(models::CHAT)
    }
}
fn default_chat_plus() -> ModelEndpoint {
    ModelEndpoint::with_model(models::CHAT_PLUS)
}
fn default_embed() -> ModelEndpoint {
    ModelEndpoint::with_model(models::EMBED)
}
fn default_rerank() -> ModelEndpoint {
    ModelEndpoint::with_model(models::RERANK)
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            chat: default_chat(),
            chat_plus: default_chat_plus(),
            embed: default_embed(),
            rerank: default_rerank(),
        }
    }
}

impl ModelsConfig {
    /// Chat endpoint; empty fields take the built-in defaults
    pub fn chat(&self) -> ModelEndpoint {
        self.chat.or_fallback(&default_chat())
    }

    pub fn chat_plus(&self) -> ModelEndpoint {
        self.chat_plus
            .or_fallback(&default_chat_plus())
            .or_fallback(&self.chat())
    }

    pub fn embed(&self) -> ModelEndpoint {
        self.embed.or_fallback(&default_embed()).or_fallback(&self.chat())
    }

    pub fn rerank(&self) -> ModelEndpoint {
        self.rerank.or_fallback(&default_rerank()).or_fallback(&self.chat())
    }
}

/// Vector store connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_qdrant_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Must match the embedding model's output dimension
    #[serde(default = "default_vector_dim")]
    pub vector_dim: u64,

    /// Create the collection and text index at startup if missing
    #[serde(default = "default_true")]
    pub ensure_collection: bool,
}

fn default_qdrant_endpoint() -> String {
    endpoints::QDRANT_DEFAULT.to_string()
}
fn default_collection() -> String {
    vector_store::COLLECTION.to_string()
}
fn default_vector_dim() -> u64 {
    vector_store::VECTOR_DIM
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_qdrant_endpoint(),
            api_key: None,
            collection: default_collection(),
            vector_dim: default_vector_dim(),
            ensure_collection: true,
        }
    }
}

/// Retrieval tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results per hybrid search
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Documents kept after reranking
    #[serde(default = "default_rerank_top_n")]
    pub rerank_top_n: usize,

    /// Cap on concurrent searches in expanded retrieval (0 = unbounded)
    #[serde(default)]
    pub max_concurrent_searches: usize,
}

fn default_search_limit() -> usize {
    retrieval::SEARCH_LIMIT
}
fn default_rerank_top_n() -> usize {
    retrieval::RERANK_TOP_N
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
            rerank_top_n: default_rerank_top_n(),
            max_concurrent_searches: retrieval::MAX_CONCURRENT_SEARCHES,
        }
    }
}

/// Which chat deployment serves streamed answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StreamVariant {
    #[default]
    Chat,
    ChatPlus,
}

/// Generation tuning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub citation_mode: CitationMode,

    #[serde(default)]
    pub stream_variant: StreamVariant,
}

/// Ingestion tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    #[serde(default = "default_max_header_level")]
    pub max_header_level: usize,
}

fn default_chunk_size() -> usize {
    ingestion::CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    ingestion::CHUNK_OVERLAP
}
fn default_embed_batch_size() -> usize {
    ingestion::EMBED_BATCH_SIZE
}
fn default_max_header_level() -> usize {
    ingestion::MAX_HEADER_LEVEL
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embed_batch_size: default_embed_batch_size(),
            max_header_level: default_max_header_level(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Enable the Prometheus recorder and `/metrics`
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from `config/` and the environment
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings from `dir/default.*`, `dir/{env}.*` and `DOCQA__*` variables
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    let default_path = dir.join("default");
    builder = builder.add_source(File::with_name(&default_path.to_string_lossy()).required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        let env_path = dir.join(env_name);
        builder = builder.add_source(File::with_name(&env_path.to_string_lossy()).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix("DOCQA")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

//! Configuration management for the document QA service
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default.*`, `config/{env}.*`)
//! - Environment variables (`DOCQA__` prefix, `__` section separator)
//!
//! Every field has a default, so an empty environment yields a valid
//! `Settings` pointing at local services.

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, load_settings_from, GenerationConfig, IngestionConfig, ModelEndpoint,
    ModelsConfig, ObservabilityConfig, RetrievalConfig, ServerConfig, Settings, StreamVariant,
    VectorStoreConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for docqa_core::Error {
    fn from(err: ConfigError) -> Self {
        docqa_core::Error::Config(err.to_string())
    }
}

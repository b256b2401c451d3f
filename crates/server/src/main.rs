//! Document QA Server Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use docqa_config::{load_settings, Settings};
use docqa_core::{ChatModel, VectorStore};
use docqa_llm::CohereClient;
use docqa_rag::QdrantStore;
use docqa_server::{create_router, init_metrics, AppState, ModelClients};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env} > config/default > defaults
    let env = std::env::var("DOCQA_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => {
            // Tracing not yet initialized
            eprintln!(
                "Loaded configuration from files (env: {})",
                env.as_deref().unwrap_or("default")
            );
            settings
        }
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&config);

    tracing::info!("Starting Document QA Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config_path = env.as_deref().unwrap_or("default"),
        collection = %config.vector_store.collection,
        stream_variant = ?config.generation.stream_variant,
        "Configuration loaded"
    );

    let clients = init_model_clients(&config)?;
    let store = init_vector_store(&config)?;

    let mut state = AppState::new(config.clone(), clients, store);
    // Not fatal; `/ready` reports it and setup is retried on later checks
    if !state.store_ready().await {
        tracing::warn!("Vector store not ready at startup; continuing");
    }
    if config.observability.metrics_enabled {
        match init_metrics() {
            Ok(handle) => {
                tracing::info!("Initialized Prometheus metrics at /metrics");
                state = state.with_metrics(handle);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to install metrics recorder"),
        }
    }

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server.host/server.port")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!(
            "docqa={level},docqa_rag={level},docqa_llm={level},docqa_server={level},\
             tower_http=debug"
        )
        .into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}

/// One client per configured model role
fn init_model_clients(config: &Settings) -> anyhow::Result<ModelClients> {
    let models = &config.models;

    let chat: Arc<dyn ChatModel> =
        Arc::new(CohereClient::new(models.chat()).context("chat model client")?);
    let chat_plus: Arc<dyn ChatModel> =
        Arc::new(CohereClient::new(models.chat_plus()).context("chat_plus model client")?);
    let embedder = Arc::new(CohereClient::new(models.embed()).context("embed model client")?);
    let reranker = Arc::new(CohereClient::new(models.rerank()).context("rerank model client")?);

    tracing::info!(
        chat = %chat.model_name(),
        chat_plus = %chat_plus.model_name(),
        "Hosted model clients initialized"
    );

    Ok(ModelClients {
        chat,
        chat_plus,
        embedder,
        reranker,
    })
}

/// Connect to Qdrant
///
/// The connection is lazy; the collection is prepared by the first
/// successful readiness check.
fn init_vector_store(config: &Settings) -> anyhow::Result<Arc<dyn VectorStore>> {
    let store = QdrantStore::new(config.vector_store.clone()).context("vector store client")?;
    tracing::info!(
        endpoint = %config.vector_store.endpoint,
        collection = %store.collection(),
        "Vector store client initialized"
    );
    Ok(Arc::new(store))
}

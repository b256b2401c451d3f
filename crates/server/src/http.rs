//! HTTP Endpoints
//!
//! REST API for question answering and uploads.
//!
//! ```text
//! GET  /                         hello
//! GET  /health                   liveness
//! GET  /ready                    vector store readiness
//! GET  /metrics                  Prometheus exposition
//! POST /query   | /aquery        batch answer
//! POST /stream  | /astream       server-sent answer chunks
//! POST /uploadfiles | /auploadfiles   multipart ingestion
//! ```

use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, MatchedPath, Multipart, Request, State},
    http::{HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{
        sse::{Event, Sse},
        Response,
    },
    routing::{get, post},
    Json, Router,
};
use docqa_core::{Answer, Question};
use docqa_rag::{IngestReport, UploadedFile};
use futures::{Stream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::metrics::{metrics_handler, record_request};
use crate::state::AppState;
use crate::ServerError;

/// Multipart field carrying uploaded files
const FILES_FIELD: &str = "files";

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let server = &state.config.server;
    let cors_layer = build_cors_layer(&server.cors_origins, server.cors_enabled);

    // Streams outlive any fixed request timeout
    let unary = Router::new()
        .route("/query", post(query))
        .route("/aquery", post(query))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_seconds,
        )));

    let uploads = Router::new()
        .route("/uploadfiles", post(upload_files))
        .route("/auploadfiles", post(upload_files))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server.max_upload_bytes));

    let streaming = Router::new()
        .route("/stream", post(stream))
        .route("/astream", post(stream));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .merge(unary)
        .merge(uploads)
        .merge(streaming)
        .route_layer(middleware::from_fn(track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - If cors_enabled is false, returns permissive layer (for dev)
/// - `*` among the origins allows any origin without credentials
/// - Otherwise, uses the configured origins
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    if origins.iter().any(|origin| origin == "*") {
        tracing::info!("CORS configured to allow any origin");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::error!("No valid CORS origins configured, cross-origin requests will be rejected");
        return CorsLayer::new().allow_methods(methods);
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods(methods)
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Per-route request counter and latency
async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;
    record_request(route, response.status().as_u16(), start.elapsed());
    response
}

async fn ensure_ready(state: &AppState) -> Result<(), ServerError> {
    if state.store_ready().await {
        Ok(())
    } else {
        Err(ServerError::NotReady)
    }
}

fn parse_question(payload: Result<Json<Question>, JsonRejection>) -> Result<Question, ServerError> {
    payload
        .map(|Json(question)| question)
        .map_err(|rejection| ServerError::InvalidRequest(rejection.body_text()))
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "Hello": "World" }))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let ready = state.store_ready().await;
    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" },
            "checks": {
                "vector_store": if ready { "ok" } else { "unavailable" },
            }
        })),
    )
}

/// Batch answer
async fn query(
    State(state): State<AppState>,
    payload: Result<Json<Question>, JsonRejection>,
) -> Result<Json<Answer>, ServerError> {
    let question = parse_question(payload)?;
    ensure_ready(&state).await?;

    tracing::debug!(rerank = question.rerank, "Query received");
    let answer = state.pipeline.answer_batch(&question).await?;
    Ok(Json(answer))
}

/// Streamed answer
///
/// Retrieval and opening the model stream happen before the response starts,
/// so their failures still produce an error status.
async fn stream(
    State(state): State<AppState>,
    payload: Result<Json<Question>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ServerError> {
    let question = parse_question(payload)?;
    ensure_ready(&state).await?;

    tracing::debug!(rerank = question.rerank, "Stream received");
    let chunks = state.pipeline.answer_stream(&question).await?;
    Ok(Sse::new(chunks.map(|chunk| Event::default().json_data(chunk))))
}

/// Multipart upload of one or more `files`
async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestReport>, ServerError> {
    ensure_ready(&state).await?;

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::InvalidRequest(e.body_text()))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload-{}", files.len()));
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::InvalidRequest(e.body_text()))?;

        files.push(UploadedFile {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    if files.is_empty() {
        return Err(ServerError::InvalidRequest(format!(
            "No '{}' parts in upload",
            FILES_FIELD
        )));
    }

    tracing::info!(files = files.len(), "Upload received");
    let report = state.ingestor.ingest_files(files).await;
    if report.has_failures() {
        return Err(ServerError::UploadFailed(report.failed));
    }
    Ok(Json(report))
}

//! Prometheus metrics
//!
//! Metric names:
//!
//! ```text
//! docqa_http_requests_total{route,status}        counter
//! docqa_http_request_duration_seconds{route}     histogram
//! docqa_http_errors_total{kind}                  counter
//! docqa_stage_latency_seconds{stage}             histogram (pipeline)
//! docqa_retrieval_searches_total                 counter   (pipeline)
//! docqa_stream_transport_closed_total            counter   (pipeline)
//! docqa_ingestion_failures_total                 counter   (ingestion)
//! ```

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

const LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Install the global Prometheus recorder
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("docqa_http_request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full("docqa_stage_latency_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install_recorder()
}

pub fn record_request(route: String, status: u16, elapsed: Duration) {
    metrics::counter!(
        "docqa_http_requests_total",
        "route" => route.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("docqa_http_request_duration_seconds", "route" => route)
        .record(elapsed.as_secs_f64());
}

pub fn record_error(kind: &'static str) {
    metrics::counter!("docqa_http_errors_total", "kind" => kind).increment(1);
}

/// `GET /metrics`
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}

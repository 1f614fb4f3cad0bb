//! Prometheus metrics: recorder setup, HTTP request tracking, and the
//! `/metrics` endpoint.

use std::sync::OnceLock;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use database::task::{self, TaskState};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::warn;

use crate::state::AppState;

/// Response header with the handling time in seconds.
pub static PROCESS_TIME_HEADER: HeaderName = HeaderName::from_static("x-process-time");

const QUEUE_STATES: [TaskState; 4] = [
    TaskState::Pending,
    TaskState::Running,
    TaskState::Retrying,
    TaskState::Dead,
];

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder once and return its handle.
///
/// If another recorder is already installed, metrics from this process are
/// not captured and the returned handle renders an empty registry.
pub fn init_metrics() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "Failed to install metrics recorder");
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

/// Count and time every request, labelled by its route template.
pub async fn track_http(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let mut response = next.run(request).await;

    let elapsed = started.elapsed().as_secs_f64();
    let status_code = response.status().as_u16().to_string();
    counter!(
        "http_requests_total",
        "method" => method.clone(),
        "endpoint" => endpoint.clone(),
        "status_code" => status_code
    )
    .increment(1);
    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "endpoint" => endpoint
    )
    .record(elapsed);

    if let Ok(value) = HeaderValue::from_str(&format!("{elapsed:.6}")) {
        response.headers_mut().insert(PROCESS_TIME_HEADER.clone(), value);
    }
    response
}

/// Render all metrics in the Prometheus text format.
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    for queue_state in QUEUE_STATES {
        match task::count_by_state(state.db.pool(), queue_state).await {
            Ok(count) => {
                gauge!("task_queue_depth", "state" => queue_state.as_str()).set(count as f64)
            }
            Err(e) => warn!(error = %e, state = queue_state.as_str(), "Failed to count tasks"),
        }
    }

    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        init_metrics().render(),
    )
        .into_response()
}

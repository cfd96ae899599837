//! Request tracing and metrics middleware.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

use super::metrics::{HttpLabels, HttpLabelsWithStatus, HttpMethod, HttpMetrics};

/// Records request count, latency and in-flight requests per route.
pub(crate) async fn track_metrics(
    State(metrics): State<Arc<HttpMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = HttpMethod::from(request.method());
    // Route templates only, so unknown paths cannot blow up label cardinality
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    metrics.http_requests_in_flight.inc();
    let started = Instant::now();
    let response = next.run(request).await;
    metrics.http_requests_in_flight.dec();

    metrics
        .http_request_duration_seconds
        .get_or_create(&HttpLabels {
            method: method.clone(),
            endpoint: endpoint.clone(),
        })
        .observe(started.elapsed().as_secs_f64());
    metrics
        .http_requests_total
        .get_or_create(&HttpLabelsWithStatus {
            method,
            endpoint,
            status: response.status().as_u16(),
        })
        .inc();
    response
}

/// Wraps each request in a span and logs its outcome.
pub(crate) async fn trace_request(request: Request, next: Next) -> Response {
    let span = tracing::debug_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path()
    );
    let started = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    span.in_scope(|| {
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), elapsed_ms, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), elapsed_ms, "Request completed");
        }
    });
    response
}

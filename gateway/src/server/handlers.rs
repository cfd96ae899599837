//! HTTP route handlers for the gateway server.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;

use super::error::ApiError;
use super::request::{SeriesParams, parse_measurement};
use crate::gateway::Gateway;
use crate::metrics::Metrics;
use crate::model::QueryResult;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub metrics: Arc<Metrics>,
}

/// Handle POST /save
///
/// Acknowledges once the measurement is queued, not once it is stored.
pub async fn handle_save(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, &'static str), ApiError> {
    let measurement = parse_measurement(&body)?;
    state.gateway.save(measurement).await?;
    Ok((StatusCode::OK, "OK"))
}

/// Handle GET /api?start=&end=&tag=
pub async fn handle_api(
    State(state): State<AppState>,
    Query(params): Query<SeriesParams>,
) -> Result<Json<QueryResult>, ApiError> {
    let request = params.into_request()?;
    let result = state.gateway.series(&request).await?;
    Ok(Json(result))
}

/// Handle /health - constant OK, touches neither the pipeline nor the backend
pub async fn handle_health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Handle /metrics endpoint - returns Prometheus text format
pub async fn handle_metrics(State(state): State<AppState>) -> String {
    state.metrics.encode()
}

/// Any path without a route
pub async fn handle_not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Unsupported path")
}

//! Mapping of gateway errors to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::Error;
use crate::ingest::IngestError;

/// Error response wrapper for converting gateway errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "bad_data"),
            Error::Ingest(IngestError::Backpressure) | Error::Ingest(IngestError::Shutdown) => {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
            }
            Error::AdmissionTimeout(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            Error::QueryTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::Backend(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
            Error::Config(_) | Error::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status();

        let body = serde_json::json!({
            "status": "error",
            "errorType": error_type,
            "error": self.0.to_string()
        });

        (status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

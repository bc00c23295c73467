//! HTTP error type for the engine API

use crate::coordinator::CoordinatorError;
use crate::services::{CatalogError, SensorError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Request is valid but the engine is not in a state to serve it (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Catalog backend failure surfaced to the client (502)
    #[error("{0}")]
    Upstream(String),

    /// Request body over the configured limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Engine is shutting down (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Common error: {0}")]
    Common(#[from] arlm_common::Error),
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(path) => ApiError::NotFound(path),
            CatalogError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            CatalogError::Cancelled => ApiError::Conflict("Request was cancelled".to_string()),
            other => {
                let message = other.user_message().unwrap_or_else(|| other.to_string());
                ApiError::Upstream(message)
            }
        }
    }
}

impl From<SensorError> for ApiError {
    fn from(err: SensorError) -> Self {
        match err {
            SensorError::NotRunning(_) => ApiError::Conflict(err.to_string()),
            SensorError::Saturated(_) => ApiError::Unavailable(err.to_string()),
            SensorError::StartFailed(..) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::Stopped => ApiError::Unavailable(err.to_string()),
            CoordinatorError::Sensor(e) => e.into(),
            CoordinatorError::Catalog(e) => e.into(),
            CoordinatorError::Superseded => ApiError::Conflict(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "CATALOG_ERROR", msg),
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_errors_map_to_statuses() {
        let cases = [
            (CatalogError::NotFound("landmark_photos".into()), StatusCode::NOT_FOUND),
            (CatalogError::InvalidRequest("bad id".into()), StatusCode::BAD_REQUEST),
            (CatalogError::Auth { status: 401 }, StatusCode::BAD_GATEWAY),
            (CatalogError::RateLimited, StatusCode::BAD_GATEWAY),
        ];
        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_coordinator_errors_map_to_statuses() {
        let response = ApiError::from(CoordinatorError::Stopped).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response =
            ApiError::from(CoordinatorError::Sensor(SensorError::NotRunning("camera"))).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}

//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::{ErrorKind, SagaError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Error returned by a command or query.
    Saga(SagaError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Saga(err) => saga_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String) {
    if let SagaError::AlreadyContracted(_) = err {
        return (StatusCode::CONFLICT, err.to_string());
    }

    match err.kind() {
        ErrorKind::Validation | ErrorKind::BusinessRule => (StatusCode::BAD_REQUEST, err.to_string()),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
        ErrorKind::Cancelled => {
            tracing::warn!(error = %err, "request cancelled");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Request cancelled".to_string(),
            )
        }
        ErrorKind::TransientInfrastructure | ErrorKind::ConstraintViolation | ErrorKind::Internal => {
            tracing::error!(error = %err, kind = ?err.kind(), "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process the request".to_string(),
            )
        }
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

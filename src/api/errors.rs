use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use crate::schemas::ResponseStatus;

#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Validation failed")]
    Validation(Value),
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Logs the underlying cause and returns the opaque 500 variant;
    /// internals never leak into response bodies.
    pub(crate) fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "Request failed");
        metrics::counter!("quizforge_internal_errors_total").increment(1);
        Self::Internal
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, data) = match self {
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message, Value::Null),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, message, Value::Null),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message, Value::Null),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message, Value::Null),
            ApiError::Validation(details) => {
                (StatusCode::BAD_REQUEST, "Validation failed".to_string(), details)
            }
            ApiError::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string(), Value::Null)
            }
        };

        let body = json!({
            "status": ResponseStatus::Fail,
            "message": message,
            "data": data,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_envelope_carries_message() {
        let response = ApiError::NotFound("Quiz not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_error_is_opaque() {
        let err = ApiError::internal("connection refused");
        assert!(matches!(err, ApiError::Internal));
        assert_eq!(err.to_string(), "Internal server error");
    }
}

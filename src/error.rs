//! Error handling for the `fieldstat` API.
//!
//! Every fallible core operation returns [`ApiError`], and each variant maps
//! to exactly one HTTP status at the boundary. Handlers can therefore end in
//! `?` and let the `IntoResponse` impl render the failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

// ---

/// API error type.
///
/// The four domain classes (validation, authorization, not-found, conflict)
/// are surfaced directly to callers with their boundary status; database
/// failures are a 500 and are never retried internally.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input: bad dates, non-numeric values, empty payload.
    #[error("{0}")]
    Validation(String),

    /// Secret mismatch or missing administrator privilege.
    #[error("{0}")]
    Authorization(&'static str),

    /// Unknown project or other missing resource.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate project registration.
    #[error("{0}")]
    Conflict(String),

    /// Underlying persistent store failure.
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    /// Shorthand for a validation failure from any displayable cause.
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    /// HTTP status corresponding to this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body rendered for every error response.
#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Server-class failures are logged with their source chain; client
        // errors are the caller's problem and stay at debug.
        if status.is_server_error() {
            tracing::error!("{}", self);
            let mut current = std::error::Error::source(&self);
            while let Some(source) = current {
                tracing::error!("Caused by: {}", source);
                current = source.source();
            }
        } else {
            tracing::debug!("request failed: {} ({})", self, status);
        }

        let body = ErrorResponse {
            error: ErrorBody {
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let err = ApiError::validation("start_date is not a valid date");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn authorization_maps_to_403() {
        let err = ApiError::Authorization("api_key mismatch");
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = ApiError::NotFound("project nope not registered".into());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_maps_to_409() {
        let err = ApiError::Conflict("project demo already exists".into());
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn database_maps_to_500() {
        let err = ApiError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn response_status_matches_variant() {
        let response = ApiError::Conflict("project demo already exists".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}

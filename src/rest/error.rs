//! API error types and responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::FormError;
use crate::validation::ValidationErrors;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Submitted step data failed validation
    Unprocessable(ValidationErrors),
    /// Malformed request body
    BadRequest(String),
    /// Hook, view or definition failure
    InternalError(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::Unprocessable(errors) => {
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(errors.to_json())).into_response();
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::InternalError(msg) => {
                tracing::error!("Form request failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

impl From<FormError> for ApiError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::Validation(errors) => ApiError::Unprocessable(errors),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_validation_response_body() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "The name field is required.");
        let response = ApiError::Unprocessable(errors).into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "The name field is required.");
        assert_eq!(json["errors"]["name"][0], "The name field is required.");
    }

    #[tokio::test]
    async fn test_hook_failure_is_internal() {
        let error: ApiError = FormError::Hook(anyhow::anyhow!("mail server down")).into();
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.error, "internal_error");
        assert!(json.message.contains("mail server down"));
    }

    #[tokio::test]
    async fn test_bad_json_is_bad_request() {
        let err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

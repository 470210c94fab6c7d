use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

/// Failure talking to the climate API.
///
/// Cloneable so that a single in-flight request can hand the same outcome to
/// every caller waiting on it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {status}: {status_text}")]
    Http { status: u16, status_text: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ExternalServiceError(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}

// Backend failures are not told apart: a 404 for an empty selection and a
// 5xx both surface as "error loading".
impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        AppError::ExternalServiceError(format!("Error loading data: {}", err))
    }
}

impl From<crate::services::percentile::CurveError> for AppError {
    fn from(err: crate::services::percentile::CurveError) -> Self {
        AppError::ExternalServiceError(format!("Unusable curve: {}", err))
    }
}

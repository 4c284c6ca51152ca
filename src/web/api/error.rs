use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::ConfigError;
use crate::elements::ElementError;
use crate::predict::PredictError;
use crate::source::SourceError;
use crate::web::auth::PermissionError;

pub enum ApiError {
    Permission(PermissionError),
    Validation(String),
    NotFound(String),
    Unavailable(String),
    Propagation(String),
}

impl From<PermissionError> for ApiError {
    fn from(e: PermissionError) -> Self {
        ApiError::Permission(e)
    }
}

impl From<ElementError> for ApiError {
    fn from(e: ElementError) -> Self {
        match e {
            ElementError::DataUnavailable(_) => ApiError::Unavailable(e.to_string()),
            ElementError::NotFound(_) => ApiError::NotFound(e.to_string()),
            ElementError::Parse { .. } => ApiError::Validation(e.to_string()),
        }
    }
}

impl From<PredictError> for ApiError {
    fn from(e: PredictError) -> Self {
        match e {
            PredictError::Elements(e) => e.into(),
            PredictError::Propagation(e) => ApiError::Propagation(e.to_string()),
            PredictError::Window { .. } => ApiError::Validation(e.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<SourceError> for ApiError {
    fn from(e: SourceError) -> Self {
        ApiError::Unavailable(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::Permission(e) => return e.into_response(),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_failed", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "data_unavailable", msg)
            }
            ApiError::Propagation(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "propagation_failed", msg)
            }
        };
        (status, Json(ErrorResponse::with_message(error, &message))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn with_message(error: &str, message: &str) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: Some(message.to_string()),
        }
    }
}

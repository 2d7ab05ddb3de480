use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{models::MessageResponse, services::ServiceError, validation::ValidationError};

/// ApiError
///
/// The HTTP-facing error. Every variant renders as a flat `{"message": "..."}` body with
/// its mapped status code.
#[derive(Debug, Error, PartialEq)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// service
    ///
    /// Translates a service failure. Business errors keep their own message; anything
    /// internal is logged with its cause and answered with `context` only.
    pub fn service(err: ServiceError, context: &str) -> Self {
        match err {
            ServiceError::Validation(e) => ApiError::BadRequest(e.0),
            ServiceError::NotFound(message) => ApiError::NotFound(message),
            ServiceError::AlreadyExists(message) => ApiError::Conflict(message),
            ServiceError::Unauthorized => ApiError::Unauthorized("invalid credentials".to_string()),
            ServiceError::InvalidToken(_) => ApiError::Unauthorized("invalid token".to_string()),
            ServiceError::Internal(_) | ServiceError::Repository(_) => {
                tracing::error!(error = %err, "{context}");
                ApiError::Internal(context.to_string())
            }
        }
    }

    /// Maps an unparsable `{id}` segment to a 400 naming the entity.
    pub fn invalid_id(entity: &'static str) -> impl FnOnce(PathRejection) -> Self {
        move |rejection| {
            tracing::debug!(error = %rejection, "rejected path id");
            ApiError::BadRequest(format!("Invalid {entity} ID"))
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.0)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "rejected request body");
        ApiError::BadRequest("Invalid request body".to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!(error = %rejection, "rejected query string");
        ApiError::BadRequest("Invalid query parameters".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::Internal(m) => m,
        };
        (status, Json(MessageResponse::new(message))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Error;

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable explanation.
    pub message: String,
}

/// Failure of an HTTP request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The addressed flag does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request body is malformed or carries disallowed fields.
    #[error("{0}")]
    InvalidRequest(String),

    /// The flag name is already taken.
    #[error("{0}")]
    Conflict(String),

    /// Anything else; details are logged, not returned.
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    /// Create an invalid-request error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// The status code this error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidRequest(_) => "bad_request",
            Self::Conflict(_) => "conflict",
            Self::Internal => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::FlagDoesNotExist { .. } | Error::NotFound { .. } => {
                Self::NotFound(err.to_string())
            }
            Error::DuplicateName { .. } => Self::Conflict(err.to_string()),
            other => {
                tracing::error!(error = %other, error_debug = ?other, "Flag operation failed");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

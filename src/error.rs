use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::repository::RepoError;

/// ApiError
///
/// Every failure a handler can report. Each variant maps to one status code and a
/// JSON body of the shape `{ "error": true, "message": "..." }`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, malformed or expired bearer token.
    #[error("unauthorized access")]
    Unauthorized,
    /// Authenticated identity does not own the requested resource.
    #[error("forbidden access")]
    Forbidden,
    #[error("not found")]
    NotFound,
    /// Request body could not be decoded as JSON.
    #[error("{0}")]
    BadRequest(String),
    /// Path identifier is not a valid id.
    #[error("invalid identifier: {0}")]
    MalformedId(String),
    #[error("store operation failed: {0}")]
    Store(#[from] RepoError),
    #[error("token signing is not configured")]
    SigningKeyMissing,
    #[error("token encoding failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: bool,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MalformedId(_)
            | ApiError::Store(_)
            | ApiError::SigningKeyMissing
            | ApiError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::MalformedId(_) => "invalid identifier".to_string(),
            ApiError::Store(_) | ApiError::Token(_) => "an error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = ErrorBody {
            error: true,
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

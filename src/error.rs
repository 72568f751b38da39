//! Error types for the PDF viewer server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::engine::EngineError;
use crate::resolver::ResolveError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    InvalidDescriptor(String),

    #[error("{0}")]
    InvalidEncoding(String),

    #[error("The document does not contain any data")]
    EmptyDocument,

    #[error("Error downloading the document: {0}")]
    UpstreamFetch(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Unknown, malformed, expired or unloaded token
    #[error("Document not found")]
    TokenNotFound,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ResolveError> for AppError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::InvalidDescriptor(msg) => AppError::InvalidDescriptor(msg),
            ResolveError::InvalidEncoding(msg) => {
                AppError::InvalidEncoding(format!("The document is not a valid Base64 string: {}", msg))
            }
            ResolveError::EmptyDocument => AppError::EmptyDocument,
            ResolveError::UpstreamFetch(msg) => AppError::UpstreamFetch(msg),
            ResolveError::FileNotFound(name) => AppError::FileNotFound(name),
        }
    }
}

impl AppError {
    /// HTTP status and stable error code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidDescriptor(_) => (StatusCode::BAD_REQUEST, "invalid_descriptor"),
            AppError::InvalidEncoding(_) => (StatusCode::BAD_REQUEST, "invalid_encoding"),
            AppError::EmptyDocument => (StatusCode::BAD_REQUEST, "empty_document"),
            AppError::UpstreamFetch(_) => (StatusCode::BAD_REQUEST, "upstream_fetch_failed"),
            AppError::FileNotFound(_) => (StatusCode::NOT_FOUND, "file_not_found"),
            AppError::TokenNotFound => (StatusCode::NOT_FOUND, "document_not_found"),
            AppError::InvalidParameter(_) => (StatusCode::BAD_REQUEST, "invalid_parameter"),
            AppError::Engine(EngineError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, "engine_error")
            }
            AppError::Engine(EngineError::Task(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "engine_error")
            }
            AppError::Engine(_) => (StatusCode::BAD_REQUEST, "engine_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_code();

        let message = match &self {
            AppError::Engine(EngineError::Task(e)) => {
                tracing::error!("Engine task failed: {}", e);
                "An internal error occurred".to_string()
            }
            AppError::Engine(e) => {
                tracing::warn!("Engine error: {}", e);
                e.to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            AppError::UpstreamFetch(reason) => {
                tracing::warn!("Upstream fetch failed: {}", reason);
                "Error downloading the document".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}

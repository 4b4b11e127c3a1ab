//! Application error type mapping to HTTP status codes and envelope format.

use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use workdesk_types::error::{BlobError, ChatError, ResourceError, SessionError};

use crate::http::response::{ErrorDetail, RequestClock};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Work order, estimate and message writes and reads.
    Resource(ResourceError),
    /// Chat session admission.
    Session(SessionError),
    /// Signed blob downloads.
    Blob(BlobError),
    /// Authentication failure.
    Unauthorized(String),
    /// Validation error.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<ResourceError> for AppError {
    fn from(e: ResourceError) -> Self {
        AppError::Resource(e)
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Session(e)
    }
}

impl From<BlobError> for AppError {
    fn from(e: BlobError) -> Self {
        AppError::Blob(e)
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Session(e) => AppError::Session(e),
            ChatError::Resource(e) => AppError::Resource(e),
        }
    }
}

impl AppError {
    /// Status, machine-readable code and message for the envelope.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Session(SessionError::Conflict(_)) => {
                (StatusCode::CONFLICT, "SESSION_CONFLICT", self.message())
            }
            AppError::Session(SessionError::Unauthorized(msg)) | AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            AppError::Session(SessionError::Expired) => {
                (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", self.message())
            }
            AppError::Session(SessionError::WorkOrderNotFound(_))
            | AppError::Resource(ResourceError::NotFound(_))
            | AppError::Blob(BlobError::NotFound) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", self.message())
            }
            AppError::Session(SessionError::Forbidden(_))
            | AppError::Resource(ResourceError::Forbidden(_)) => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", self.message())
            }
            AppError::Resource(ResourceError::Validation(msg)) | AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Blob(BlobError::InvalidKey(_)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", self.message())
            }
            AppError::Resource(ResourceError::Cancelled) => (
                StatusCode::GATEWAY_TIMEOUT,
                "REQUEST_TIMEOUT",
                "The request did not finish in time and was rolled back".to_string(),
            ),
            AppError::Blob(BlobError::InvalidSignature | BlobError::Expired) => {
                (StatusCode::FORBIDDEN, "INVALID_SIGNATURE", self.message())
            }
            AppError::Session(SessionError::Storage(_))
            | AppError::Resource(ResourceError::Storage(_))
            | AppError::Blob(BlobError::Io(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_FAILURE",
                self.message(),
            ),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Resource(e) => e.to_string(),
            AppError::Session(e) => e.to_string(),
            AppError::Blob(e) => e.to_string(),
            AppError::Unauthorized(msg) | AppError::Validation(msg) | AppError::Internal(msg) => {
                msg.clone()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(code, error = %message, "request failed");
        }

        let detail = ErrorDetail { code, message };
        let body = detail.body(RequestClock::start().meta(), HashMap::new());
        let mut response = (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response();
        response.extensions_mut().insert(detail);
        response
    }
}

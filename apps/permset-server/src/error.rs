//! HTTP error shape shared by every handler.
//!
//! Internal errors log details server-side and return a generic message.

use axum::extract::rejection::PathRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use permset_core::ServiceError;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::UnknownPermission(_) => {
                Self::new(StatusCode::BAD_REQUEST, "unknown_permission", err.to_string())
            }
            ServiceError::AssignmentDisabled { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "assignment_disabled", err.to_string())
            }
            ServiceError::ValidationFailed { .. }
            | ServiceError::InvalidResourceId(_)
            | ServiceError::InvalidPrincipal(_)
            | ServiceError::InvalidAction => ApiError::validation(err.to_string()),
            ServiceError::Store(ref store) => {
                tracing::error!(error = ?store, "permission store error");
                ApiError::internal("failed to update permissions")
            }
            ServiceError::Hook {
                ref permission,
                ref record,
                ref source,
            } => {
                tracing::error!(
                    permission = %permission,
                    record = ?record,
                    error = %source,
                    "permission committed but hook failed"
                );
                ApiError::internal("permission was saved but a follow-up action failed")
            }
        }
    }
}

//! Error types for the folder module

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for folder operations
pub type FolderResult<T> = Result<T, FolderError>;

/// Folder module error types
#[derive(Debug, Error)]
pub enum FolderError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid criteria: {reason}")]
    InvalidCriteria { reason: String },

    #[error("Duplicate folder id: {id}")]
    DuplicateId { id: String },

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Conflict: folder {folder_id} was modified (expected: {expected}, current: {current})")]
    Conflict {
        folder_id: String,
        expected: String,
        current: String,
    },

    #[error("Permission denied: {action} on folder {folder_id}")]
    PermissionDenied { action: String, folder_id: String },

    #[error("Evaluation unavailable: {reason}")]
    EvaluationUnavailable { reason: String },

    #[error("Store error: {0}")]
    Store(String),
}

impl From<serde_json::Error> for FolderError {
    fn from(err: serde_json::Error) -> Self {
        FolderError::Validation(err.to_string())
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl FolderError {
    /// Convert to API error code
    pub fn code(&self) -> &'static str {
        match self {
            FolderError::Validation(_) => "VALIDATION_ERROR",
            FolderError::InvalidCriteria { .. } => "INVALID_CRITERIA",
            FolderError::DuplicateId { .. } => "DUPLICATE_ID",
            FolderError::FolderNotFound(_) => "FOLDER_NOT_FOUND",
            FolderError::DocumentNotFound(_) => "DOCUMENT_NOT_FOUND",
            FolderError::Conflict { .. } => "CONFLICT",
            FolderError::PermissionDenied { .. } => "PERMISSION_DENIED",
            FolderError::EvaluationUnavailable { .. } => "EVALUATION_UNAVAILABLE",
            FolderError::Store(_) => "STORE_ERROR",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            FolderError::FolderNotFound(_) | FolderError::DocumentNotFound(_) => {
                StatusCode::NOT_FOUND
            }

            FolderError::PermissionDenied { .. } => StatusCode::FORBIDDEN,

            FolderError::Conflict { .. } => StatusCode::CONFLICT,

            FolderError::Validation(_) | FolderError::InvalidCriteria { .. } => {
                StatusCode::BAD_REQUEST
            }

            FolderError::EvaluationUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,

            FolderError::DuplicateId { .. } | FolderError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the caller may retry the same request later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FolderError::EvaluationUnavailable { .. } | FolderError::Conflict { .. }
        )
    }

    pub(crate) fn invalid_criteria(reason: impl Into<String>) -> Self {
        FolderError::InvalidCriteria {
            reason: reason.into(),
        }
    }

    pub(crate) fn denied(action: impl Into<String>, folder_id: impl Into<String>) -> Self {
        FolderError::PermissionDenied {
            action: action.into(),
            folder_id: folder_id.into(),
        }
    }
}

impl IntoResponse for FolderError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiError {
            code: self.code().to_string(),
            message: self.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            FolderError::FolderNotFound("a".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            FolderError::denied("delete", "a").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            FolderError::invalid_criteria("min > max").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            FolderError::EvaluationUnavailable {
                reason: "timeout".into()
            }
            .status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_codes_and_messages() {
        let err = FolderError::Conflict {
            folder_id: "f1".into(),
            expected: "W/\"1\"".into(),
            current: "W/\"2\"".into(),
        };
        assert_eq!(err.code(), "CONFLICT");
        assert!(err.to_string().contains("f1"));
        assert!(err.is_transient());
        assert!(!FolderError::Validation("x".into()).is_transient());
    }

    #[tokio::test]
    async fn test_response_body_shape() {
        let response = FolderError::FolderNotFound("a".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "code": "FOLDER_NOT_FOUND",
                "message": "Folder not found: a"
            })
        );
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::ApprovalStatus;
use crate::repository::RepositoryError;
use crate::services::documents::DocumentError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Deliberately identical for unknown email and wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Account is awaiting approval")]
    PendingApproval,

    #[error("Application was rejected")]
    Rejected,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// The 403 error matching a non-approved status, if any
    pub fn for_unapproved(status: ApprovalStatus) -> Option<Self> {
        match status {
            ApprovalStatus::Pending => Some(AppError::PendingApproval),
            ApprovalStatus::Rejected => Some(AppError::Rejected),
            ApprovalStatus::Approved => None,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Unauthorized => "unauthorized",
            AppError::PendingApproval => "pending_approval",
            AppError::Rejected => "rejected",
            AppError::NotFound(_) => "not_found",
            AppError::Storage(_) => "storage_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => AppError::NotFound("Record not found".to_string()),
            RepositoryError::DuplicateEmail => {
                AppError::Conflict("Email already registered".to_string())
            }
            RepositoryError::DuplicateCard => {
                AppError::Conflict("Card uid already provisioned".to_string())
            }
            RepositoryError::DuplicateAccountNumber | RepositoryError::DuplicateCardHolder => {
                AppError::Storage(err.to_string())
            }
            RepositoryError::Storage(msg) => AppError::Storage(msg),
        }
    }
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Io(e) => AppError::Internal(anyhow::Error::new(e)),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();

        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Administrator authorization required".to_string(),
            ),
            AppError::PendingApproval | AppError::Rejected => {
                (StatusCode::FORBIDDEN, self.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "Internal failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = match self {
            AppError::PendingApproval => Json(json!({
                "error": code,
                "message": message,
                "status": ApprovalStatus::Pending,
            })),
            AppError::Rejected => Json(json!({
                "error": code,
                "message": message,
                "status": ApprovalStatus::Rejected,
            })),
            _ => Json(json!({
                "error": code,
                "message": message,
            })),
        };

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

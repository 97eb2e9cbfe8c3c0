// ABOUTME: Shared API response envelope and error-to-status mapping
// ABOUTME: Every failure carries a stable kind string plus a readable message

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson},
};
use serde::Serialize;

use atelier_sandbox::SandboxError;
use atelier_storage::StorageError;

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }

    pub fn error(kind: &str, message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            error_kind: Some(kind.to_string()),
        }
    }
}

/// Unified handler error: wraps domain errors and maps them to HTTP statuses
#[derive(Debug)]
pub enum ApiError {
    Storage(StorageError),
    Sandbox(SandboxError),
    Unauthorized(String),
    Validation(String),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<SandboxError> for ApiError {
    fn from(e: SandboxError) -> Self {
        Self::Sandbox(e)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(StorageError::Json(e))
    }
}

impl ApiError {
    fn status_kind_message(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", message.clone())
            }
            Self::Validation(message) => {
                (StatusCode::BAD_REQUEST, "validation_error", message.clone())
            }
            Self::Storage(e) => {
                let (status, kind) = match e {
                    StorageError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                    StorageError::Validation(_) | StorageError::SyncNotEnabled(_) => {
                        (StatusCode::BAD_REQUEST, "validation_error")
                    }
                    StorageError::WriteFailed(_) | StorageError::Blob(_) | StorageError::Mirror(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "storage_write_failed")
                    }
                    StorageError::ReadFailed(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "storage_read_failed")
                    }
                    StorageError::BackendUnavailable(_) | StorageError::Http(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "backend_unavailable")
                    }
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
                };
                (status, kind, e.to_string())
            }
            Self::Sandbox(e) => {
                let (status, kind) = match e {
                    SandboxError::InstanceNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                    SandboxError::SessionNotFound(_) => {
                        (StatusCode::NOT_FOUND, "session_not_found")
                    }
                    SandboxError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
                    SandboxError::BootFailed(_) | SandboxError::ImageError(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "sandbox_boot_failed")
                    }
                    SandboxError::InstanceActive => (StatusCode::CONFLICT, "sandbox_boot_failed"),
                    SandboxError::OutputLeased(_) => (StatusCode::CONFLICT, "stream_error"),
                    SandboxError::Stream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "stream_error"),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
                };
                (status, kind, e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, kind, message) = self.status_kind_message();
        (status, ResponseJson(ApiResponse::<()>::error(kind, message))).into_response()
    }
}

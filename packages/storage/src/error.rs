// ABOUTME: Error types for the tiered storage layer
// ABOUTME: Covers metadata, blob store, remote mirror and orchestration failures

use thiserror::Error;

/// Main error type for storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// File record not found
    #[error("File not found: {0}")]
    NotFound(String),

    /// Invalid input (missing fields, bad paths, oversized content)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backend bytes were written but could not be committed, or vice versa
    #[error("Storage write failed: {0}")]
    WriteFailed(String),

    /// Backend bytes could not be read back
    #[error("Storage read failed: {0}")]
    ReadFailed(String),

    /// Blob or mirror backend is unreachable
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Blob store rejected an operation
    #[error("Blob store error: {0}")]
    Blob(String),

    /// Remote mirror rejected an operation
    #[error("Remote mirror error: {0}")]
    Mirror(String),

    /// Remote sync requested for a project without sync settings
    #[error("Remote sync not enabled for project: {0}")]
    SyncNotEnabled(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Results that return StorageError
pub type Result<T> = std::result::Result<T, StorageError>;

// ABOUTME: Error types for sandbox instance and terminal session management
// ABOUTME: Covers boot conflicts, missing sessions, runtime and streaming failures

use thiserror::Error;

/// Main error type for sandbox operations
#[derive(Error, Debug)]
pub enum SandboxError {
    /// Docker/runtime-level errors
    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// The runtime already has a live instance; only one may exist process-wide
    #[error("Sandbox instance already active")]
    InstanceActive,

    /// No instance with this id is known to the registry
    #[error("Sandbox instance not found: {0}")]
    InstanceNotFound(String),

    /// The runtime could not produce a usable instance after conflict recovery
    #[error("Sandbox boot failed: {0}")]
    BootFailed(String),

    /// The session's process handle is absent (instance recycled or stopped)
    #[error("Terminal session not found: {0}")]
    SessionNotFound(String),

    /// A second reader tried to take the single-consumer output stream
    #[error("Terminal output already streaming for session: {0}")]
    OutputLeased(String),

    /// Output relay failure
    #[error("Stream error: {0}")]
    Stream(String),

    /// Sandbox image missing or unusable
    #[error("Sandbox image error: {0}")]
    ImageError(String),

    /// Invalid input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Results that return SandboxError
pub type Result<T> = std::result::Result<T, SandboxError>;

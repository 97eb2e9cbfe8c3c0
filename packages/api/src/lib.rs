// ABOUTME: HTTP API layer for Atelier providing REST endpoints and routing
// ABOUTME: Integration layer over the storage and sandbox domain packages

use std::sync::Arc;

use axum::{
    extract::FromRef,
    routing::{delete, get, post, put},
    Router,
};

use atelier_sandbox::{InstanceRegistry, SandboxRuntime, TerminalSessionManager};
use atelier_storage::StorageManager;

pub mod auth;
pub mod files_handlers;
pub mod response;
pub mod sandbox_handlers;
pub mod sse;
pub mod storage_handlers;
pub mod terminal_handlers;
pub mod validation;

pub use auth::{AuthConfig, CurrentUser};
pub use response::{ApiError, ApiResponse};

/// Shared state for all API handlers
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<StorageManager>,
    pub registry: Arc<InstanceRegistry>,
    pub terminals: Arc<TerminalSessionManager>,
    pub runtime: Arc<dyn SandboxRuntime>,
    pub sse_tracker: sse::SseConnectionTracker,
    pub auth: AuthConfig,
}

impl FromRef<AppState> for AuthConfig {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Creates the files API router
pub fn create_files_router() -> Router<AppState> {
    Router::new()
        .route("/api/files", post(files_handlers::create_file))
        .route("/api/files/{id}", get(files_handlers::get_file))
        .route("/api/files/{id}", put(files_handlers::update_file))
        .route("/api/files/{id}", delete(files_handlers::delete_file))
        .route(
            "/api/projects/{project_id}/files",
            get(files_handlers::list_project_files),
        )
}

/// Creates the storage action router (verb carried in the payload)
pub fn create_storage_router() -> Router<AppState> {
    Router::new().route("/api/storage", post(storage_handlers::storage_action))
}

/// Creates the sandbox instance router
pub fn create_sandbox_router() -> Router<AppState> {
    Router::new()
        .route("/api/sandbox/instances", post(sandbox_handlers::acquire_instance))
        .route("/api/sandbox/instances/{id}", get(sandbox_handlers::get_instance))
        .route(
            "/api/sandbox/instances/{id}",
            delete(sandbox_handlers::release_instance),
        )
        .route(
            "/api/sandbox/instances/{id}/preview",
            put(sandbox_handlers::update_preview),
        )
        .route(
            "/api/sandbox/instances/{id}/fs/read",
            post(sandbox_handlers::sandbox_read_file),
        )
        .route(
            "/api/sandbox/instances/{id}/fs/write",
            post(sandbox_handlers::sandbox_write_file),
        )
        .route(
            "/api/sandbox/instances/{id}/fs/remove",
            post(sandbox_handlers::sandbox_remove_path),
        )
}

/// Creates the terminal session router
pub fn create_terminal_router() -> Router<AppState> {
    Router::new()
        .route("/api/terminal/sessions", post(terminal_handlers::start_session))
        .route(
            "/api/terminal/sessions/{id}/input",
            post(terminal_handlers::session_input),
        )
        .route(
            "/api/terminal/sessions/{id}/resize",
            post(terminal_handlers::resize_session),
        )
        .route(
            "/api/terminal/sessions/{id}",
            delete(terminal_handlers::stop_session),
        )
        .route(
            "/api/terminal/sessions/{id}/stream",
            get(terminal_handlers::stream_session_output),
        )
}

/// Creates the full API router over the shared state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(create_files_router())
        .merge(create_storage_router())
        .merge(create_sandbox_router())
        .merge(create_terminal_router())
        .with_state(state)
}

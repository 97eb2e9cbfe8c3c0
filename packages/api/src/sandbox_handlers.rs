// ABOUTME: HTTP request handlers for sandbox instance lifecycle and in-sandbox file I/O
// ABOUTME: Acquire/release/status/preview plus read/write/remove inside a named instance

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use atelier_sandbox::SandboxInstance;

use crate::auth::CurrentUser;
use crate::files_handlers::{decode_content, encode_content, ContentEncoding};
use crate::response::{ApiError, ApiResponse};
use crate::validation::{validate_content_size, validate_id, validate_path};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceResponse {
    pub id: String,
    pub project_id: String,
    pub status: String,
    pub port: Option<u16>,
    pub preview_url: Option<String>,
    pub last_activity: chrono::DateTime<chrono::Utc>,
}

impl From<SandboxInstance> for InstanceResponse {
    fn from(instance: SandboxInstance) -> Self {
        Self {
            id: instance.id,
            project_id: instance.project_id,
            status: instance.status.as_str().to_string(),
            port: instance.port,
            preview_url: instance.preview_url,
            last_activity: instance.last_activity,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquireInstanceRequest {
    pub project_id: String,
}

/// POST /api/sandbox/instances
pub async fn acquire_instance(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(request): Json<AcquireInstanceRequest>,
) -> Result<Json<ApiResponse<InstanceResponse>>, ApiError> {
    validate_id(&request.project_id, "projectId")?;

    info!("Acquiring sandbox instance for project {}", request.project_id);
    let instance = state.registry.acquire(&request.project_id).await?;
    Ok(Json(ApiResponse::success(instance.into())))
}

/// GET /api/sandbox/instances/{id}
pub async fn get_instance(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(instance_id): Path<String>,
) -> Result<Json<ApiResponse<InstanceResponse>>, ApiError> {
    validate_id(&instance_id, "instanceId")?;
    let instance = state.registry.get(&instance_id).await?;
    Ok(Json(ApiResponse::success(instance.into())))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePreviewRequest {
    pub preview_url: Option<String>,
    pub port: Option<u16>,
}

/// PUT /api/sandbox/instances/{id}/preview
pub async fn update_preview(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(instance_id): Path<String>,
    Json(request): Json<UpdatePreviewRequest>,
) -> Result<Json<ApiResponse<InstanceResponse>>, ApiError> {
    validate_id(&instance_id, "instanceId")?;

    let instance = state
        .registry
        .update_preview(&instance_id, request.preview_url.as_deref(), request.port)
        .await?;
    Ok(Json(ApiResponse::success(instance.into())))
}

/// DELETE /api/sandbox/instances/{id}
pub async fn release_instance(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(instance_id): Path<String>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    validate_id(&instance_id, "instanceId")?;
    state.registry.release(&instance_id).await?;
    Ok(Json(ApiResponse::success("Instance released")))
}

// ==================== In-sandbox file I/O ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxPathRequest {
    pub path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxWriteRequest {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub encoding: ContentEncoding,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxReadResponse {
    pub path: String,
    pub content: String,
    pub encoding: ContentEncoding,
}

/// POST /api/sandbox/instances/{id}/fs/read
pub async fn sandbox_read_file(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(instance_id): Path<String>,
    Json(request): Json<SandboxPathRequest>,
) -> Result<Json<ApiResponse<SandboxReadResponse>>, ApiError> {
    validate_id(&instance_id, "instanceId")?;
    let path = validate_path(&request.path)?;

    let runtime_id = state.registry.runtime_id(&instance_id).await?;
    let bytes = state.runtime.read_file(&runtime_id, &path).await?;
    let (content, encoding) = encode_content(&bytes);

    Ok(Json(ApiResponse::success(SandboxReadResponse {
        path,
        content,
        encoding,
    })))
}

/// POST /api/sandbox/instances/{id}/fs/write
pub async fn sandbox_write_file(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(instance_id): Path<String>,
    Json(request): Json<SandboxWriteRequest>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    validate_id(&instance_id, "instanceId")?;
    let path = validate_path(&request.path)?;
    let content = decode_content(&request.content, request.encoding)?;
    validate_content_size(content.len())?;

    let runtime_id = state.registry.runtime_id(&instance_id).await?;
    state.runtime.write_file(&runtime_id, &path, &content).await?;
    Ok(Json(ApiResponse::success("File written")))
}

/// POST /api/sandbox/instances/{id}/fs/remove
pub async fn sandbox_remove_path(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(instance_id): Path<String>,
    Json(request): Json<SandboxPathRequest>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    validate_id(&instance_id, "instanceId")?;
    let path = validate_path(&request.path)?;

    let runtime_id = state.registry.runtime_id(&instance_id).await?;
    state.runtime.remove_path(&runtime_id, &path).await?;
    Ok(Json(ApiResponse::success("Path removed")))
}

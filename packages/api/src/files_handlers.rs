// ABOUTME: HTTP request handlers for file CRUD
// ABOUTME: Create, read, list, update and delete files through the storage manager

use axum::{
    extract::{Path, State},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::info;

use atelier_storage::{FileRecord, LoadedFile, SaveMetadata};

use crate::auth::CurrentUser;
use crate::response::{ApiError, ApiResponse};
use crate::validation::{validate_content_size, validate_id, validate_path};
use crate::AppState;

/// Content transfer encoding for file payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    #[default]
    Utf8,
    Base64,
}

pub(crate) fn decode_content(content: &str, encoding: ContentEncoding) -> Result<Vec<u8>, ApiError> {
    match encoding {
        ContentEncoding::Utf8 => Ok(content.as_bytes().to_vec()),
        ContentEncoding::Base64 => BASE64
            .decode(content)
            .map_err(|e| ApiError::Validation(format!("invalid base64 content: {}", e))),
    }
}

pub(crate) fn encode_content(content: &[u8]) -> (String, ContentEncoding) {
    match std::str::from_utf8(content) {
        Ok(text) => (text.to_string(), ContentEncoding::Utf8),
        Err(_) => (BASE64.encode(content), ContentEncoding::Base64),
    }
}

/// File metadata shape shared by all file responses
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub id: String,
    pub path: String,
    pub size: i64,
    pub storage_tier: Option<String>,
    pub checksum: String,
    pub is_directory: bool,
    pub is_binary: bool,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<&FileRecord> for FileSummary {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id.clone(),
            path: record.path.clone(),
            size: record.size,
            storage_tier: record.storage_tier.map(|t| t.as_str().to_string()),
            checksum: record.checksum.clone(),
            is_directory: record.is_directory,
            is_binary: record.is_binary,
            updated_at: record.updated_at,
        }
    }
}

/// File response including content
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    #[serde(flatten)]
    pub summary: FileSummary,
    pub content: String,
    pub encoding: ContentEncoding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_error: Option<String>,
}

impl From<LoadedFile> for FileResponse {
    fn from(loaded: LoadedFile) -> Self {
        let (content, encoding) = encode_content(&loaded.content);
        Self {
            summary: FileSummary::from(&loaded.record),
            content,
            encoding,
            backend_error: loaded.backend_error,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileRequest {
    pub project_id: String,
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: ContentEncoding,
    #[serde(default)]
    pub is_directory: bool,
    #[serde(default)]
    pub is_binary: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    pub content: String,
    #[serde(default)]
    pub encoding: ContentEncoding,
}

/// GET /api/files/{id}
pub async fn get_file(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(file_id): Path<String>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    validate_id(&file_id, "fileId")?;
    let loaded = state.storage.load(&file_id).await?;
    Ok(Json(ApiResponse::success(loaded.into())))
}

/// GET /api/projects/{project_id}/files
pub async fn list_project_files(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(project_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<FileSummary>>>, ApiError> {
    validate_id(&project_id, "projectId")?;
    let records = state.storage.list_project_files(&project_id).await?;
    let summaries = records.iter().map(FileSummary::from).collect();
    Ok(Json(ApiResponse::success(summaries)))
}

/// POST /api/files
pub async fn create_file(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateFileRequest>,
) -> Result<Json<ApiResponse<FileSummary>>, ApiError> {
    validate_id(&request.project_id, "projectId")?;
    let path = validate_path(&request.path)?;
    let content = decode_content(&request.content, request.encoding)?;
    validate_content_size(content.len())?;

    info!("Creating file {} in project {}", path, request.project_id);
    let record = state
        .storage
        .save(
            &request.project_id,
            &path,
            content,
            SaveMetadata {
                is_directory: request.is_directory,
                is_binary: request.is_binary,
                last_modified_by: Some(user.id),
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(FileSummary::from(&record))))
}

/// PUT /api/files/{id}
pub async fn update_file(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(file_id): Path<String>,
    Json(request): Json<UpdateFileRequest>,
) -> Result<Json<ApiResponse<FileSummary>>, ApiError> {
    validate_id(&file_id, "fileId")?;
    let content = decode_content(&request.content, request.encoding)?;
    validate_content_size(content.len())?;

    let record = state.storage.update(&file_id, content).await?;
    Ok(Json(ApiResponse::success(FileSummary::from(&record))))
}

/// DELETE /api/files/{id}
pub async fn delete_file(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(file_id): Path<String>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    validate_id(&file_id, "fileId")?;
    state.storage.delete(&file_id).await?;
    info!("Deleted file {}", file_id);
    Ok(Json(ApiResponse::success("File deleted successfully")))
}

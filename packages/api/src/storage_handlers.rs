// ABOUTME: Single storage action endpoint dispatching on a typed action payload
// ABOUTME: enable-sync, sync-project, save-file and load-file verbs

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use atelier_storage::{RemoteSyncOptions, SaveMetadata};

use crate::auth::CurrentUser;
use crate::files_handlers::{decode_content, ContentEncoding, FileResponse, FileSummary};
use crate::response::{ApiError, ApiResponse};
use crate::validation::{validate_content_size, validate_id, validate_path};
use crate::AppState;

/// Action payload for POST /api/storage; the verb travels in the body
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StorageActionRequest {
    EnableSync {
        project_id: String,
        repo_name: String,
        description: Option<String>,
        #[serde(default = "default_true")]
        is_private: bool,
        #[serde(default)]
        auto_commit: bool,
    },
    SyncProject {
        project_id: String,
    },
    SaveFile {
        project_id: String,
        file_path: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        encoding: ContentEncoding,
    },
    LoadFile {
        project_id: String,
        file_path: String,
    },
}

fn default_true() -> bool {
    true
}

/// POST /api/storage
pub async fn storage_action(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<StorageActionRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    match request {
        StorageActionRequest::EnableSync {
            project_id,
            repo_name,
            description,
            is_private,
            auto_commit,
        } => {
            validate_id(&project_id, "projectId")?;
            validate_id(&repo_name, "repoName")?;

            info!("Enabling remote sync for project {}", project_id);
            let settings = state
                .storage
                .enable_sync(
                    &project_id,
                    RemoteSyncOptions {
                        repo_name,
                        description,
                        is_private,
                        auto_commit,
                    },
                )
                .await?;

            Ok(Json(ApiResponse::success(json!({
                "projectId": settings.project_id,
                "repoName": settings.repo_name,
                "repoUrl": settings.repo_url,
                "enabled": settings.enabled,
            }))))
        }

        StorageActionRequest::SyncProject { project_id } => {
            validate_id(&project_id, "projectId")?;

            info!("Syncing project {} to remote mirror", project_id);
            let report = state.storage.sync_project_to_remote(&project_id, None).await?;

            Ok(Json(ApiResponse::success(json!({
                "repoUrl": report.repo_url,
                "syncedFiles": report.synced_files,
                "failedFiles": report.failed_files,
            }))))
        }

        StorageActionRequest::SaveFile {
            project_id,
            file_path,
            content,
            encoding,
        } => {
            validate_id(&project_id, "projectId")?;
            let path = validate_path(&file_path)?;
            let content = decode_content(&content, encoding)?;
            validate_content_size(content.len())?;

            let record = state
                .storage
                .save(
                    &project_id,
                    &path,
                    content,
                    SaveMetadata {
                        last_modified_by: Some(user.id),
                        ..Default::default()
                    },
                )
                .await?;

            Ok(Json(ApiResponse::success(serde_json::to_value(
                FileSummary::from(&record),
            )?)))
        }

        StorageActionRequest::LoadFile {
            project_id,
            file_path,
        } => {
            validate_id(&project_id, "projectId")?;
            let path = validate_path(&file_path)?;

            let loaded = state.storage.load_by_path(&project_id, &path).await?;
            Ok(Json(ApiResponse::success(serde_json::to_value(
                FileResponse::from(loaded),
            )?)))
        }
    }
}

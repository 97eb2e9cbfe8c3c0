// ABOUTME: Storage manager orchestrating the inline, blob and remote mirror tiers
// ABOUTME: Owns the placement decision and keeps metadata consistent with actual bytes

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::blob::BlobStore;
use crate::error::{Result, StorageError};
use crate::files::FileStore;
use crate::mirror::RemoteMirror;
use crate::policy::PlacementPolicy;
use crate::types::{
    content_checksum, FileRecord, FileSyncFailure, LoadedFile, ProjectSyncReport,
    ProjectSyncSettings, RemoteSyncOptions, SaveMetadata, StorageTier,
};

/// Blob object key: project-scoped, per-file, content-addressed by checksum
/// prefix so distinct contents never share a key
fn blob_key(project_id: &str, file_id: &str, checksum: &str) -> String {
    format!("{}/{}/{}", project_id, file_id, &checksum[..16.min(checksum.len())])
}

/// One save/load/delete contract over three storage tiers.
///
/// Bytes are always written to the chosen backend before metadata commits, so
/// a committed record never references missing content. `update`/`delete`
/// against the same file id serialize through a per-file lock; effects are
/// last-committed-wins as seen by subsequent loads.
pub struct StorageManager {
    store: FileStore,
    blob: Arc<dyn BlobStore>,
    mirror: Option<Arc<dyn RemoteMirror>>,
    policy: PlacementPolicy,
    file_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl StorageManager {
    pub fn new(
        store: FileStore,
        blob: Arc<dyn BlobStore>,
        mirror: Option<Arc<dyn RemoteMirror>>,
        policy: PlacementPolicy,
    ) -> Self {
        Self {
            store,
            blob,
            mirror,
            policy,
            file_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn file_store(&self) -> &FileStore {
        &self.store
    }

    async fn lock_for(&self, file_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.file_locks.lock().await;
        locks
            .entry(file_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Save content to a path, creating the record on first write.
    ///
    /// A second save to the same path mutates the existing record (the path is
    /// unique within a project), including tier migration when the size crosses
    /// the threshold.
    pub async fn save(
        &self,
        project_id: &str,
        path: &str,
        content: Vec<u8>,
        metadata: SaveMetadata,
    ) -> Result<FileRecord> {
        if project_id.is_empty() || path.is_empty() {
            return Err(StorageError::Validation(
                "projectId and path are required".to_string(),
            ));
        }

        if let Some(existing) = self.store.get_by_path(project_id, path).await? {
            return self.update(&existing.id, content).await;
        }

        let now = Utc::now();
        let id = nanoid::nanoid!();

        if metadata.is_directory {
            // Directories carry no content and are never assigned a tier
            let record = FileRecord {
                id,
                project_id: project_id.to_string(),
                path: path.to_string(),
                content: None,
                storage_key: None,
                storage_tier: None,
                size: 0,
                checksum: content_checksum(&[]),
                is_directory: true,
                is_binary: false,
                last_modified_by: metadata.last_modified_by,
                created_at: now,
                updated_at: now,
            };
            self.store.insert(&record).await?;
            return Ok(record);
        }

        let size = content.len() as u64;
        let checksum = content_checksum(&content);
        let tier = self.policy.decide(size);

        let mut record = FileRecord {
            id: id.clone(),
            project_id: project_id.to_string(),
            path: path.to_string(),
            content: None,
            storage_key: None,
            storage_tier: Some(tier),
            size: size as i64,
            checksum,
            is_directory: false,
            is_binary: metadata.is_binary,
            last_modified_by: metadata.last_modified_by,
            created_at: now,
            updated_at: now,
        };

        match tier {
            StorageTier::Inline => {
                record.content = Some(content);
                self.store.insert(&record).await?;
            }
            StorageTier::Blob => {
                let key = blob_key(project_id, &id, &record.checksum);
                // Backend bytes first, metadata second
                self.blob.put(&key, Bytes::from(content)).await?;
                record.storage_key = Some(key.clone());

                if let Err(e) = self.store.insert(&record).await {
                    // Metadata commit failed after the blob write: clean up the
                    // orphan, best effort only
                    if let Err(cleanup) = self.blob.delete(&key).await {
                        warn!(
                            "Failed to clean up orphaned blob {} after metadata failure: {}",
                            key, cleanup
                        );
                    }
                    return Err(StorageError::WriteFailed(format!(
                        "metadata commit failed for {}: {}",
                        path, e
                    )));
                }
            }
        }

        debug!(
            "Saved {} ({} bytes, tier {:?}) for project {}",
            path, size, tier, project_id
        );
        Ok(record)
    }

    /// Load a file's content and metadata by id.
    ///
    /// A failed blob read degrades to metadata plus empty content with
    /// `backend_error` set, so callers listing many files survive a backend
    /// outage.
    pub async fn load(&self, file_id: &str) -> Result<LoadedFile> {
        let mut record = self
            .store
            .get(file_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(file_id.to_string()))?;

        if record.is_directory {
            return Ok(LoadedFile {
                record,
                content: Vec::new(),
                backend_error: None,
            });
        }

        match record.storage_tier {
            Some(StorageTier::Inline) => {
                let content = record.content.take().unwrap_or_default();
                Ok(LoadedFile {
                    record,
                    content,
                    backend_error: None,
                })
            }
            Some(StorageTier::Blob) => {
                let key = record.storage_key.clone().ok_or_else(|| {
                    StorageError::ReadFailed(format!("blob record {} has no storage key", file_id))
                })?;

                match self.blob.get(&key).await {
                    Ok(bytes) => Ok(LoadedFile {
                        record,
                        content: bytes.to_vec(),
                        backend_error: None,
                    }),
                    Err(e) => {
                        warn!("Blob read failed for {} ({}): {}", file_id, key, e);
                        Ok(LoadedFile {
                            record,
                            content: Vec::new(),
                            backend_error: Some(e.to_string()),
                        })
                    }
                }
            }
            None => Ok(LoadedFile {
                record,
                content: Vec::new(),
                backend_error: None,
            }),
        }
    }

    /// Load by project-scoped path instead of id
    pub async fn load_by_path(&self, project_id: &str, path: &str) -> Result<LoadedFile> {
        let record = self
            .store
            .get_by_path(project_id, path)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("{}:{}", project_id, path)))?;
        self.load(&record.id).await
    }

    /// List a project's file metadata (inline content stripped)
    pub async fn list_project_files(&self, project_id: &str) -> Result<Vec<FileRecord>> {
        let mut records = self.store.list_by_project(project_id).await?;
        for record in &mut records {
            record.content = None;
        }
        Ok(records)
    }

    /// Replace a file's content, migrating tiers when the size crosses the
    /// threshold.
    ///
    /// Migration order is write-new, commit-metadata, delete-old: readers see
    /// either the old committed record (old bytes still present) or the new
    /// one, never a record pointing at deleted content.
    pub async fn update(&self, file_id: &str, content: Vec<u8>) -> Result<FileRecord> {
        let lock = self.lock_for(file_id).await;
        let _guard = lock.lock().await;

        let existing = self
            .store
            .get(file_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(file_id.to_string()))?;

        if existing.is_directory {
            return Err(StorageError::Validation(
                "cannot write content to a directory".to_string(),
            ));
        }

        let size = content.len() as u64;
        let checksum = content_checksum(&content);
        let new_tier = self.policy.decide(size);
        let old_tier = existing.storage_tier;
        let old_key = existing.storage_key.clone();

        let mut updated = FileRecord {
            content: None,
            storage_key: None,
            storage_tier: Some(new_tier),
            size: size as i64,
            checksum,
            updated_at: Utc::now(),
            ..existing
        };

        match new_tier {
            StorageTier::Inline => {
                updated.content = Some(content);
            }
            StorageTier::Blob => {
                // Content-addressed key: a failed metadata commit can never
                // leave the committed record describing different bytes
                let key = blob_key(&updated.project_id, &updated.id, &updated.checksum);
                self.blob.put(&key, Bytes::from(content)).await?;
                updated.storage_key = Some(key);
            }
        }

        if let Err(e) = self.store.update_content(&updated).await {
            // New bytes were written but metadata still points at the old
            // content; remove the new object if it was a fresh key
            if new_tier == StorageTier::Blob && updated.storage_key != old_key {
                if let Some(key) = &updated.storage_key {
                    if let Err(cleanup) = self.blob.delete(key).await {
                        warn!("Failed to clean up blob {} after failed update: {}", key, cleanup);
                    }
                }
            }
            return Err(StorageError::WriteFailed(format!(
                "metadata commit failed for {}: {}",
                file_id, e
            )));
        }

        // Metadata now references the new tier; release the old object if the
        // file migrated out of the blob store. Best effort: a failure leaves an
        // unreferenced object, never a dangling record.
        if let (Some(StorageTier::Blob), Some(key)) = (&old_tier, &old_key) {
            if updated.storage_key.as_deref() != Some(key.as_str()) {
                if let Err(e) = self.blob.delete(key).await {
                    warn!("Failed to release blob {} after tier migration: {}", key, e);
                }
            }
        }

        debug!(
            "Updated {} ({} bytes, tier {:?} -> {:?})",
            file_id, size, old_tier, new_tier
        );
        Ok(updated)
    }

    /// Delete a file, releasing backend bytes first.
    ///
    /// A failed backend delete keeps the metadata row and surfaces the fault:
    /// a reachable record must never silently point at unreachable content,
    /// and conversely content is never orphaned behind a deleted record.
    pub async fn delete(&self, file_id: &str) -> Result<()> {
        let lock = self.lock_for(file_id).await;
        let _guard = lock.lock().await;

        let existing = self
            .store
            .get(file_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(file_id.to_string()))?;

        if let (Some(StorageTier::Blob), Some(key)) = (&existing.storage_tier, &existing.storage_key)
        {
            self.blob.delete(key).await.map_err(|e| {
                StorageError::WriteFailed(format!(
                    "blob delete failed for {}, record retained: {}",
                    file_id, e
                ))
            })?;
        }

        self.store.delete(file_id).await?;

        let mut locks = self.file_locks.lock().await;
        locks.remove(file_id);

        debug!("Deleted file {}", file_id);
        Ok(())
    }

    /// Persist sync settings for a project and make sure the repository exists
    pub async fn enable_sync(
        &self,
        project_id: &str,
        options: RemoteSyncOptions,
    ) -> Result<ProjectSyncSettings> {
        let mirror = self
            .mirror
            .as_ref()
            .ok_or_else(|| StorageError::Mirror("remote mirror not configured".to_string()))?;

        let repo_url = mirror.ensure_repository(&options).await?;

        let settings = ProjectSyncSettings {
            project_id: project_id.to_string(),
            repo_name: options.repo_name,
            description: options.description,
            is_private: options.is_private,
            auto_commit: options.auto_commit,
            repo_url: Some(repo_url),
            enabled: true,
            updated_at: Utc::now(),
        };
        self.store.upsert_sync_settings(&settings).await?;

        info!("Remote sync enabled for project {}", project_id);
        Ok(settings)
    }

    /// Push every non-directory file of a project to the remote mirror.
    ///
    /// Partial failure never aborts the sync: the report carries the synced
    /// subset and a per-path error for everything else.
    pub async fn sync_project_to_remote(
        &self,
        project_id: &str,
        options: Option<RemoteSyncOptions>,
    ) -> Result<ProjectSyncReport> {
        let mirror = self
            .mirror
            .as_ref()
            .ok_or_else(|| StorageError::Mirror("remote mirror not configured".to_string()))?;

        let options = match options {
            Some(options) => options,
            None => {
                let settings = self
                    .store
                    .get_sync_settings(project_id)
                    .await?
                    .filter(|s| s.enabled)
                    .ok_or_else(|| StorageError::SyncNotEnabled(project_id.to_string()))?;
                RemoteSyncOptions {
                    repo_name: settings.repo_name,
                    description: settings.description,
                    is_private: settings.is_private,
                    auto_commit: settings.auto_commit,
                }
            }
        };

        let repo_url = mirror.ensure_repository(&options).await?;
        self.store.set_sync_repo_url(project_id, &repo_url).await?;

        let records = self.store.list_by_project(project_id).await?;
        let mut synced_files = Vec::new();
        let mut failed_files = Vec::new();

        for record in records.into_iter().filter(|r| !r.is_directory) {
            let loaded = match self.load(&record.id).await {
                Ok(loaded) => loaded,
                Err(e) => {
                    failed_files.push(FileSyncFailure {
                        path: record.path.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if let Some(backend_error) = loaded.backend_error {
                failed_files.push(FileSyncFailure {
                    path: record.path.clone(),
                    error: backend_error,
                });
                continue;
            }

            let message = format!("Sync {} from Atelier", record.path);
            match mirror
                .push_file(&options.repo_name, &record.path, &loaded.content, &message)
                .await
            {
                Ok(()) => synced_files.push(record.path),
                Err(e) => failed_files.push(FileSyncFailure {
                    path: record.path,
                    error: e.to_string(),
                }),
            }
        }

        info!(
            "Synced {}/{} files of project {} to {}",
            synced_files.len(),
            synced_files.len() + failed_files.len(),
            project_id,
            repo_url
        );

        Ok(ProjectSyncReport {
            repo_url,
            synced_files,
            failed_files,
        })
    }
}

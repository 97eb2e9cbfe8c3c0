// ABOUTME: Core type definitions for the tiered storage layer
// ABOUTME: File records, placement tiers, load results and remote sync reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, StorageError};

/// Storage backend currently holding a file's bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageTier {
    /// Content lives in the `content` column of the files table
    Inline,
    /// Content lives in the external blob store under `storage_key`
    Blob,
}

impl StorageTier {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inline => "inline",
            Self::Blob => "blob",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "inline" => Ok(Self::Inline),
            "blob" => Ok(Self::Blob),
            _ => Err(StorageError::Validation(format!("invalid storage tier: {}", s))),
        }
    }
}

/// File metadata row plus inline content when present.
///
/// Invariant: exactly one of `content` / `storage_key` is populated for the
/// record's tier; directories carry neither and have no tier. `size` and
/// `checksum` always describe the current content regardless of tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub project_id: String,
    /// Unique within a project
    pub path: String,
    /// Present only when tier = inline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<u8>>,
    /// Opaque blob locator, present only when tier = blob
    pub storage_key: Option<String>,
    /// None for directories
    pub storage_tier: Option<StorageTier>,
    /// Authoritative content size in bytes
    pub size: i64,
    /// SHA-256 of the current content, hex-encoded
    pub checksum: String,
    pub is_directory: bool,
    pub is_binary: bool,
    pub last_modified_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied attributes for a save
#[derive(Debug, Clone, Default)]
pub struct SaveMetadata {
    pub is_directory: bool,
    pub is_binary: bool,
    pub last_modified_by: Option<String>,
}

/// Result of a `load`: metadata always, content when the backend answered.
///
/// `backend_error` is set instead of failing hard when the blob read is
/// unavailable, so listing flows stay resilient.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedFile {
    pub record: FileRecord,
    pub content: Vec<u8>,
    pub backend_error: Option<String>,
}

/// Options for enabling/running a remote mirror sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSyncOptions {
    pub repo_name: String,
    pub description: Option<String>,
    pub is_private: bool,
    pub auto_commit: bool,
}

/// Persisted per-project sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSyncSettings {
    pub project_id: String,
    pub repo_name: String,
    pub description: Option<String>,
    pub is_private: bool,
    pub auto_commit: bool,
    pub repo_url: Option<String>,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

/// Per-path failure during a project sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSyncFailure {
    pub path: String,
    pub error: String,
}

/// Outcome of `sync_project_to_remote`: partial failure is reported per path,
/// never as an all-or-nothing error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSyncReport {
    pub repo_url: String,
    pub synced_files: Vec<String>,
    pub failed_files: Vec<FileSyncFailure>,
}

/// SHA-256 checksum of content bytes, hex-encoded
pub fn content_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

// ABOUTME: SQLite metadata store for file records and project sync settings
// ABOUTME: Provides CRUD over the files table with a unique (project_id, path) constraint

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::types::{FileRecord, ProjectSyncSettings, StorageTier};

/// Metadata store for file records
#[derive(Clone)]
pub struct FileStore {
    pool: SqlitePool,
}

impl FileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the storage tables if they do not exist yet
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                path TEXT NOT NULL,
                content BLOB,
                storage_key TEXT,
                storage_tier TEXT,
                size INTEGER NOT NULL DEFAULT 0,
                checksum TEXT NOT NULL DEFAULT '',
                is_directory INTEGER NOT NULL DEFAULT 0,
                is_binary INTEGER NOT NULL DEFAULT 0,
                last_modified_by TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(project_id, path)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS project_sync_settings (
                project_id TEXT PRIMARY KEY,
                repo_name TEXT NOT NULL,
                description TEXT,
                is_private INTEGER NOT NULL DEFAULT 1,
                auto_commit INTEGER NOT NULL DEFAULT 0,
                repo_url TEXT,
                enabled INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert(&self, record: &FileRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO files (
                id, project_id, path, content, storage_key, storage_tier,
                size, checksum, is_directory, is_binary, last_modified_by,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.project_id)
        .bind(&record.path)
        .bind(&record.content)
        .bind(&record.storage_key)
        .bind(record.storage_tier.map(|t| t.as_str().to_string()))
        .bind(record.size)
        .bind(&record.checksum)
        .bind(record.is_directory)
        .bind(record.is_binary)
        .bind(&record.last_modified_by)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replace the content-bearing columns of an existing row
    pub async fn update_content(&self, record: &FileRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE files
            SET content = ?, storage_key = ?, storage_tier = ?,
                size = ?, checksum = ?, is_binary = ?, last_modified_by = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.content)
        .bind(&record.storage_key)
        .bind(record.storage_tier.map(|t| t.as_str().to_string()))
        .bind(record.size)
        .bind(&record.checksum)
        .bind(record.is_binary)
        .bind(&record.last_modified_by)
        .bind(record.updated_at.to_rfc3339())
        .bind(&record.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get(&self, file_id: &str) -> Result<Option<FileRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, project_id, path, content, storage_key, storage_tier,
                   size, checksum, is_directory, is_binary, last_modified_by,
                   created_at, updated_at
            FROM files WHERE id = ?
            "#,
        )
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    pub async fn get_by_path(&self, project_id: &str, path: &str) -> Result<Option<FileRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, project_id, path, content, storage_key, storage_tier,
                   size, checksum, is_directory, is_binary, last_modified_by,
                   created_at, updated_at
            FROM files WHERE project_id = ? AND path = ?
            "#,
        )
        .bind(project_id)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    pub async fn list_by_project(&self, project_id: &str) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, project_id, path, content, storage_key, storage_tier,
                   size, checksum, is_directory, is_binary, last_modified_by,
                   created_at, updated_at
            FROM files WHERE project_id = ?
            ORDER BY path ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    /// Returns true when a row was deleted
    pub async fn delete(&self, file_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(file_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Sync settings ====================

    pub async fn upsert_sync_settings(&self, settings: &ProjectSyncSettings) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO project_sync_settings (
                project_id, repo_name, description, is_private, auto_commit,
                repo_url, enabled, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_id) DO UPDATE SET
                repo_name = excluded.repo_name,
                description = excluded.description,
                is_private = excluded.is_private,
                auto_commit = excluded.auto_commit,
                repo_url = excluded.repo_url,
                enabled = excluded.enabled,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&settings.project_id)
        .bind(&settings.repo_name)
        .bind(&settings.description)
        .bind(settings.is_private)
        .bind(settings.auto_commit)
        .bind(&settings.repo_url)
        .bind(settings.enabled)
        .bind(settings.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_sync_settings(&self, project_id: &str) -> Result<Option<ProjectSyncSettings>> {
        let row = sqlx::query(
            r#"
            SELECT project_id, repo_name, description, is_private, auto_commit,
                   repo_url, enabled, updated_at
            FROM project_sync_settings WHERE project_id = ?
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ProjectSyncSettings {
            project_id: row.get("project_id"),
            repo_name: row.get("repo_name"),
            description: row.get("description"),
            is_private: row.get("is_private"),
            auto_commit: row.get("auto_commit"),
            repo_url: row.get("repo_url"),
            enabled: row.get("enabled"),
            updated_at: parse_timestamp(row.get("updated_at")),
        }))
    }

    pub async fn set_sync_repo_url(&self, project_id: &str, repo_url: &str) -> Result<()> {
        sqlx::query(
            "UPDATE project_sync_settings SET repo_url = ?, updated_at = ? WHERE project_id = ?",
        )
        .bind(repo_url)
        .bind(Utc::now().to_rfc3339())
        .bind(project_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<FileRecord> {
        let tier: Option<String> = row.get("storage_tier");
        let storage_tier = tier.as_deref().map(StorageTier::from_str).transpose()?;

        Ok(FileRecord {
            id: row.get("id"),
            project_id: row.get("project_id"),
            path: row.get("path"),
            content: row.get("content"),
            storage_key: row.get("storage_key"),
            storage_tier,
            size: row.get("size"),
            checksum: row.get("checksum"),
            is_directory: row.get("is_directory"),
            is_binary: row.get("is_binary"),
            last_modified_by: row.get("last_modified_by"),
            created_at: parse_timestamp(row.get("created_at")),
            updated_at: parse_timestamp(row.get("updated_at")),
        })
    }
}

fn parse_timestamp(value: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

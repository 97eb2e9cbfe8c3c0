// ABOUTME: SQLite persistence for sandbox instances and terminal sessions
// ABOUTME: Rows mirror the in-memory registry/session state for inspection endpoints

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::types::{InstanceStatus, SandboxInstance, SessionStatus, TerminalSession};

/// Store for sandbox instance rows
#[derive(Clone)]
pub struct InstanceStore {
    pool: SqlitePool,
}

impl InstanceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sandbox_instances (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                status TEXT NOT NULL,
                runtime_id TEXT,
                port INTEGER,
                preview_url TEXT,
                last_activity TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn upsert(&self, instance: &SandboxInstance) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sandbox_instances (
                id, project_id, status, runtime_id, port, preview_url,
                last_activity, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                project_id = excluded.project_id,
                status = excluded.status,
                runtime_id = excluded.runtime_id,
                port = excluded.port,
                preview_url = excluded.preview_url,
                last_activity = excluded.last_activity
            "#,
        )
        .bind(&instance.id)
        .bind(&instance.project_id)
        .bind(instance.status.as_str())
        .bind(&instance.runtime_id)
        .bind(instance.port.map(|p| p as i64))
        .bind(&instance.preview_url)
        .bind(instance.last_activity.to_rfc3339())
        .bind(instance.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, instance_id: &str) -> Result<Option<SandboxInstance>> {
        let row = sqlx::query(
            r#"
            SELECT id, project_id, status, runtime_id, port, preview_url,
                   last_activity, created_at
            FROM sandbox_instances WHERE id = ?
            "#,
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let status: String = row.get("status");
            Ok(SandboxInstance {
                id: row.get("id"),
                project_id: row.get("project_id"),
                status: InstanceStatus::from_str(&status)?,
                runtime_id: row.get("runtime_id"),
                port: row.get::<Option<i64>, _>("port").map(|p| p as u16),
                preview_url: row.get("preview_url"),
                last_activity: parse_timestamp(row.get("last_activity")),
                created_at: parse_timestamp(row.get("created_at")),
            })
        })
        .transpose()
    }

    pub async fn set_status(&self, instance_id: &str, status: InstanceStatus) -> Result<()> {
        sqlx::query("UPDATE sandbox_instances SET status = ?, last_activity = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(instance_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn update_preview(
        &self,
        instance_id: &str,
        preview_url: Option<&str>,
        port: Option<u16>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sandbox_instances
            SET preview_url = COALESCE(?, preview_url),
                port = COALESCE(?, port),
                last_activity = ?
            WHERE id = ?
            "#,
        )
        .bind(preview_url)
        .bind(port.map(|p| p as i64))
        .bind(Utc::now().to_rfc3339())
        .bind(instance_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Store for terminal session rows
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS terminal_sessions (
                id TEXT PRIMARY KEY,
                sandbox_instance_id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                owner_user_id TEXT NOT NULL,
                process_id TEXT NOT NULL,
                status TEXT NOT NULL,
                cols INTEGER NOT NULL,
                rows INTEGER NOT NULL,
                last_activity TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert(&self, session: &TerminalSession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO terminal_sessions (
                id, sandbox_instance_id, project_id, owner_user_id, process_id,
                status, cols, rows, last_activity, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.sandbox_instance_id)
        .bind(&session.project_id)
        .bind(&session.owner_user_id)
        .bind(&session.process_id)
        .bind(session.status.as_str())
        .bind(session.cols as i64)
        .bind(session.rows as i64)
        .bind(session.last_activity.to_rfc3339())
        .bind(session.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<TerminalSession>> {
        let row = sqlx::query(
            r#"
            SELECT id, sandbox_instance_id, project_id, owner_user_id, process_id,
                   status, cols, rows, last_activity, created_at
            FROM terminal_sessions WHERE id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let status: String = row.get("status");
            Ok(TerminalSession {
                id: row.get("id"),
                sandbox_instance_id: row.get("sandbox_instance_id"),
                project_id: row.get("project_id"),
                owner_user_id: row.get("owner_user_id"),
                process_id: row.get("process_id"),
                status: SessionStatus::from_str(&status)?,
                cols: row.get::<i64, _>("cols") as u16,
                rows: row.get::<i64, _>("rows") as u16,
                last_activity: parse_timestamp(row.get("last_activity")),
                created_at: parse_timestamp(row.get("created_at")),
            })
        })
        .transpose()
    }

    pub async fn set_status(&self, session_id: &str, status: SessionStatus) -> Result<()> {
        sqlx::query("UPDATE terminal_sessions SET status = ?, last_activity = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn update_size(&self, session_id: &str, cols: u16, rows: u16) -> Result<()> {
        sqlx::query(
            "UPDATE terminal_sessions SET cols = ?, rows = ?, last_activity = ? WHERE id = ?",
        )
        .bind(cols as i64)
        .bind(rows as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn touch(&self, session_id: &str) -> Result<()> {
        sqlx::query("UPDATE terminal_sessions SET last_activity = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn parse_timestamp(value: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

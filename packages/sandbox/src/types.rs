// ABOUTME: Core type definitions for sandbox instances and terminal sessions
// ABOUTME: Status enums, instance/session records and terminal geometry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SandboxError};

/// Sandbox instance lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    /// Boot in flight; no second boot may proceed while this holds
    Booting,
    /// Instance is usable
    Ready,
    /// Boot failed
    Error,
    /// Explicitly torn down
    Terminated,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Booting => "booting",
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Terminated => "terminated",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "booting" => Ok(Self::Booting),
            "ready" => Ok(Self::Ready),
            "error" => Ok(Self::Error),
            "terminated" => Ok(Self::Terminated),
            _ => Err(SandboxError::Validation(format!("invalid instance status: {}", s))),
        }
    }
}

/// One sandboxed execution environment; at most one active per project,
/// and the runtime permits only one live instance process-wide
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxInstance {
    pub id: String,
    pub project_id: String,
    pub status: InstanceStatus,
    /// Identifier the runtime knows the instance by (container id)
    pub runtime_id: Option<String>,
    pub port: Option<u16>,
    pub preview_url: Option<String>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Terminal session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Exited,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Exited => "exited",
            Self::Error => "error",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(Self::Running),
            "exited" => Ok(Self::Exited),
            "error" => Ok(Self::Error),
            _ => Err(SandboxError::Validation(format!("invalid session status: {}", s))),
        }
    }
}

/// Terminal geometry in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// One interactive process inside a sandbox instance.
///
/// The process handle itself lives in memory with the session manager; the
/// row records the runtime exec id for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalSession {
    pub id: String,
    pub sandbox_instance_id: String,
    pub project_id: String,
    pub owner_user_id: String,
    pub process_id: String,
    pub status: SessionStatus,
    pub cols: u16,
    pub rows: u16,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_round_trip_through_str() {
        assert_eq!(InstanceStatus::from_str("booting").unwrap(), InstanceStatus::Booting);
        assert_eq!(InstanceStatus::Ready.as_str(), "ready");
        assert!(InstanceStatus::from_str("paused").is_err());

        assert_eq!(SessionStatus::from_str("running").unwrap(), SessionStatus::Running);
        assert!(SessionStatus::from_str("zombie").is_err());
    }

    #[test]
    fn default_terminal_size_is_80x24() {
        let size = TerminalSize::default();
        assert_eq!((size.cols, size.rows), (80, 24));
    }
}

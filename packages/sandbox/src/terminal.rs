// ABOUTME: Terminal session manager bridging interactive sandbox processes to clients
// ABOUTME: Single-writer input ordering and exclusive output leases per session

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Result, SandboxError};
use crate::runtime::{ProcessInput, ProcessOutput, SandboxRuntime};
use crate::storage::SessionStore;
use crate::stream::OutputLease;
use crate::types::{SessionStatus, TerminalSession, TerminalSize};

/// In-memory handle to a session's live process
struct SessionHandle {
    process_id: String,
    /// FIFO-fair mutex: writers are serialized in submission order, so bytes
    /// from concurrent callers never interleave mid-message
    input: Mutex<ProcessInput>,
    /// The single-consumer output source; `None` while a lease is out
    output: Arc<std::sync::Mutex<Option<ProcessOutput>>>,
}

/// Creates and tracks interactive process sessions inside a sandbox instance
pub struct TerminalSessionManager {
    runtime: Arc<dyn SandboxRuntime>,
    store: SessionStore,
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl TerminalSessionManager {
    pub fn new(runtime: Arc<dyn SandboxRuntime>, store: SessionStore) -> Self {
        Self {
            runtime,
            store,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Spawn an interactive shell in the instance and register the session.
    ///
    /// The session id is generated when the caller did not supply one; the
    /// terminal defaults to 80x24.
    pub async fn start(
        &self,
        runtime_id: &str,
        instance_id: &str,
        project_id: &str,
        owner_user_id: &str,
        session_id: Option<String>,
        size: Option<TerminalSize>,
    ) -> Result<TerminalSession> {
        let session_id = session_id.unwrap_or_else(|| nanoid::nanoid!());
        let size = size.unwrap_or_default();

        {
            let sessions = self.sessions.read().await;
            if sessions.contains_key(&session_id) {
                return Err(SandboxError::Validation(format!(
                    "session id already in use: {}",
                    session_id
                )));
            }
        }

        let process = self.runtime.spawn_shell(runtime_id, size).await?;

        let now = Utc::now();
        let session = TerminalSession {
            id: session_id.clone(),
            sandbox_instance_id: instance_id.to_string(),
            project_id: project_id.to_string(),
            owner_user_id: owner_user_id.to_string(),
            process_id: process.process_id.clone(),
            status: SessionStatus::Running,
            cols: size.cols,
            rows: size.rows,
            last_activity: now,
            created_at: now,
        };
        self.store.insert(&session).await?;

        let handle = Arc::new(SessionHandle {
            process_id: process.process_id,
            input: Mutex::new(process.input),
            output: Arc::new(std::sync::Mutex::new(Some(process.output))),
        });
        self.sessions.write().await.insert(session_id.clone(), handle);

        info!(
            "Started terminal session {} in instance {} for {}",
            session_id, instance_id, owner_user_id
        );
        Ok(session)
    }

    async fn handle(&self, session_id: &str) -> Result<Arc<SessionHandle>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| SandboxError::SessionNotFound(session_id.to_string()))
    }

    /// Forward bytes to the session's process input.
    ///
    /// The input mutex is FIFO-fair, so caller submission order is preserved
    /// and two writers never interleave within one message.
    pub async fn write(&self, session_id: &str, data: &[u8]) -> Result<()> {
        let handle = self.handle(session_id).await?;

        let mut input = handle.input.lock().await;
        if let Err(e) = async {
            input.write_all(data).await?;
            input.flush().await
        }
        .await
        {
            warn!("Input write failed for session {}: {}", session_id, e);
            drop(input);
            self.store.set_status(session_id, SessionStatus::Error).await?;
            return Err(SandboxError::Stream(format!("input write failed: {}", e)));
        }

        self.store.touch(session_id).await?;
        Ok(())
    }

    /// Update the recorded size and notify the process of its new dimensions
    pub async fn resize(&self, session_id: &str, cols: u16, rows: u16) -> Result<()> {
        if cols == 0 || rows == 0 {
            return Err(SandboxError::Validation("cols and rows must be positive".to_string()));
        }

        let handle = self.handle(session_id).await?;
        self.runtime.resize_process(&handle.process_id, cols, rows).await?;
        self.store.update_size(session_id, cols, rows).await?;
        debug!("Resized session {} to {}x{}", session_id, cols, rows);
        Ok(())
    }

    /// Release the process handle; the session is gone for all later calls
    pub async fn stop(&self, session_id: &str) -> Result<()> {
        let removed = self.sessions.write().await.remove(session_id);
        if removed.is_none() {
            return Err(SandboxError::SessionNotFound(session_id.to_string()));
        }

        // Dropping the handle closes the input half; the shell sees EOF
        drop(removed);
        self.store.set_status(session_id, SessionStatus::Exited).await?;
        info!("Stopped terminal session {}", session_id);
        Ok(())
    }

    /// Take exclusive read access to the session's output source.
    ///
    /// The source supports a single active reader; a second subscriber is
    /// refused until the first lease is dropped (which returns the source).
    pub async fn take_output(&self, session_id: &str) -> Result<OutputLease> {
        let handle = self.handle(session_id).await?;

        let stream = {
            let mut slot = handle
                .output
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slot.take()
        };

        match stream {
            Some(stream) => Ok(OutputLease::new(
                session_id.to_string(),
                handle.output.clone(),
                stream,
            )),
            None => Err(SandboxError::OutputLeased(session_id.to_string())),
        }
    }

    /// Record that the session's process reached end-of-output
    pub async fn mark_exited(&self, session_id: &str) -> Result<()> {
        self.sessions.write().await.remove(session_id);
        self.store.set_status(session_id, SessionStatus::Exited).await?;
        debug!("Session {} exited", session_id);
        Ok(())
    }

    /// Session metadata by id
    pub async fn get(&self, session_id: &str) -> Result<TerminalSession> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| SandboxError::SessionNotFound(session_id.to_string()))
    }
}

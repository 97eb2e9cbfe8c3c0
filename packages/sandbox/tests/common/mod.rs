// ABOUTME: Shared test doubles for sandbox package integration tests
// ABOUTME: In-memory SandboxRuntime with scriptable boot conflicts and channel-backed processes
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::SqlitePool;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;

use atelier_sandbox::{
    Result, RuntimeInstance, SandboxError, SandboxRuntime, SpawnedProcess, TerminalSize,
};

/// Test-side handles of a spawned fake process
pub struct FakeSpawn {
    pub process_id: String,
    /// Push output chunks (or errors) the session will observe
    pub output_tx: mpsc::UnboundedSender<Result<Bytes>>,
    /// Read what the session wrote to the process input
    pub input_peer: DuplexStream,
}

/// Scriptable in-memory sandbox runtime
#[derive(Default)]
pub struct FakeRuntime {
    pub boot_calls: AtomicUsize,
    pub boot_delay_ms: u64,
    /// When set, boot reports the runtime-wide single-instance conflict
    pub conflict: AtomicBool,
    /// When set, boot fails outright (image missing etc.)
    pub fail_boot: AtomicBool,
    /// What find_active discovers after a conflict
    pub active: Mutex<Option<RuntimeInstance>>,
    pub resize_calls: Mutex<Vec<(String, u16, u16)>>,
    spawned: Mutex<Vec<FakeSpawn>>,
    spawn_counter: AtomicUsize,
}

impl FakeRuntime {
    pub fn with_boot_delay(ms: u64) -> Self {
        Self {
            boot_delay_ms: ms,
            ..Default::default()
        }
    }

    /// Handles of the most recent spawn
    pub fn take_last_spawn(&self) -> FakeSpawn {
        self.spawned.lock().unwrap().pop().expect("no spawn recorded")
    }
}

#[async_trait]
impl SandboxRuntime for FakeRuntime {
    async fn boot(&self, project_id: &str) -> Result<RuntimeInstance> {
        let call = self.boot_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.boot_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.boot_delay_ms)).await;
        }

        if self.conflict.load(Ordering::SeqCst) {
            return Err(SandboxError::InstanceActive);
        }
        if self.fail_boot.load(Ordering::SeqCst) {
            return Err(SandboxError::ImageError("image missing".to_string()));
        }

        let instance = RuntimeInstance {
            runtime_id: format!("rt-{}", call),
            project_id: Some(project_id.to_string()),
        };
        *self.active.lock().unwrap() = Some(instance.clone());
        Ok(instance)
    }

    async fn find_active(&self) -> Result<Option<RuntimeInstance>> {
        Ok(self.active.lock().unwrap().clone())
    }

    async fn spawn_shell(&self, _runtime_id: &str, _size: TerminalSize) -> Result<SpawnedProcess> {
        let n = self.spawn_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let process_id = format!("exec-{}", n);

        let (input, input_peer) = tokio::io::duplex(64 * 1024);
        let (output_tx, mut output_rx) = mpsc::unbounded_channel::<Result<Bytes>>();

        let output = Box::pin(async_stream::stream! {
            while let Some(item) = output_rx.recv().await {
                yield item;
            }
        });

        self.spawned.lock().unwrap().push(FakeSpawn {
            process_id: process_id.clone(),
            output_tx,
            input_peer,
        });

        Ok(SpawnedProcess {
            process_id,
            input: Box::pin(input),
            output,
        })
    }

    async fn resize_process(&self, process_id: &str, cols: u16, rows: u16) -> Result<()> {
        self.resize_calls
            .lock()
            .unwrap()
            .push((process_id.to_string(), cols, rows));
        Ok(())
    }

    async fn read_file(&self, _runtime_id: &str, _path: &str) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn write_file(&self, _runtime_id: &str, _path: &str, _content: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn remove_path(&self, _runtime_id: &str, _path: &str) -> Result<()> {
        Ok(())
    }
}

pub async fn test_pool() -> SqlitePool {
    SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

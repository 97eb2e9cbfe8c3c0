// ABOUTME: Integration tests for the HTTP API over in-memory backends
// ABOUTME: Auth enforcement, file CRUD, storage actions and sandbox/terminal lifecycle

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::ServiceExt;

use atelier_api::{create_router, sse::SseConnectionTracker, AppState, AuthConfig};
use atelier_config::SandboxConfig;
use atelier_sandbox::{
    InstanceRegistry, InstanceStore, RuntimeInstance, SandboxRuntime, SessionStore, SpawnedProcess,
    TerminalSessionManager, TerminalSize,
};
use atelier_storage::{
    BlobStore, FileStore, PlacementPolicy, Result as StorageResult, StorageError, StorageManager,
};

const TOKEN: &str = "test-token";

/// In-memory blob store for routing tests
#[derive(Default)]
struct MemoryBlob {
    objects: Mutex<HashMap<String, Bytes>>,
}

#[async_trait]
impl BlobStore for MemoryBlob {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::ReadFailed(format!("missing: {}", key)))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Minimal runtime: boots instantly, shells are loopback pipes
#[derive(Default)]
struct LoopbackRuntime {
    files: Mutex<HashMap<String, Vec<u8>>>,
    /// Held so session input writes have a live peer
    peers: Mutex<Vec<tokio::io::DuplexStream>>,
}

#[async_trait]
impl SandboxRuntime for LoopbackRuntime {
    async fn boot(&self, project_id: &str) -> atelier_sandbox::Result<RuntimeInstance> {
        Ok(RuntimeInstance {
            runtime_id: "rt-1".to_string(),
            project_id: Some(project_id.to_string()),
        })
    }

    async fn find_active(&self) -> atelier_sandbox::Result<Option<RuntimeInstance>> {
        Ok(None)
    }

    async fn spawn_shell(
        &self,
        _runtime_id: &str,
        _size: TerminalSize,
    ) -> atelier_sandbox::Result<SpawnedProcess> {
        let (input, peer) = tokio::io::duplex(4096);
        self.peers.lock().unwrap().push(peer);
        let output: Pin<Box<dyn futures::Stream<Item = atelier_sandbox::Result<Bytes>> + Send>> =
            Box::pin(futures::stream::empty());
        Ok(SpawnedProcess {
            process_id: "exec-1".to_string(),
            input: Box::pin(input),
            output,
        })
    }

    async fn resize_process(
        &self,
        _process_id: &str,
        _cols: u16,
        _rows: u16,
    ) -> atelier_sandbox::Result<()> {
        Ok(())
    }

    async fn read_file(&self, _runtime_id: &str, path: &str) -> atelier_sandbox::Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| atelier_sandbox::SandboxError::Io(std::io::Error::other("no such file")))
    }

    async fn write_file(
        &self,
        _runtime_id: &str,
        path: &str,
        content: &[u8],
    ) -> atelier_sandbox::Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn remove_path(&self, _runtime_id: &str, path: &str) -> atelier_sandbox::Result<()> {
        self.files.lock().unwrap().remove(path);
        Ok(())
    }
}

async fn test_app() -> axum::Router {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();

    let file_store = FileStore::new(pool.clone());
    file_store.init_schema().await.unwrap();
    let instance_store = InstanceStore::new(pool.clone());
    instance_store.init_schema().await.unwrap();
    let session_store = SessionStore::new(pool.clone());
    session_store.init_schema().await.unwrap();

    let storage = Arc::new(StorageManager::new(
        file_store,
        Arc::new(MemoryBlob::default()),
        None,
        PlacementPolicy::new(100 * 1024),
    ));

    let runtime: Arc<dyn SandboxRuntime> = Arc::new(LoopbackRuntime::default());
    let registry = Arc::new(InstanceRegistry::new(
        runtime.clone(),
        instance_store,
        SandboxConfig {
            boot_backoff_ms: 10,
            boot_wait_timeout_ms: 1_000,
            ..Default::default()
        },
    ));
    let terminals = Arc::new(TerminalSessionManager::new(runtime.clone(), session_store));

    create_router(AppState {
        storage,
        registry,
        terminals,
        runtime,
        sse_tracker: SseConnectionTracker::new(),
        auth: AuthConfig {
            api_token: Some(TOKEN.to_string()),
            dev_mode: false,
        },
    })
}

fn authed(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
        .header(header::CONTENT_TYPE, "application/json");
    match body {
        Some(value) => builder.body(Body::from(value.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn requests_without_identity_are_unauthorized() {
    let app = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/api/files/some-id")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error_kind"], "unauthorized");
}

#[tokio::test]
async fn wrong_token_is_unauthorized() {
    let app = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/api/files/some-id")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn file_crud_round_trip() {
    let app = test_app().await;

    // Create
    let response = app
        .clone()
        .oneshot(authed(
            Method::POST,
            "/api/files",
            Some(json!({
                "projectId": "proj-1",
                "path": "src/main.rs",
                "content": "fn main() {}",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["storageTier"], "inline");
    let file_id = body["data"]["id"].as_str().unwrap().to_string();

    // Read
    let response = app
        .clone()
        .oneshot(authed(Method::GET, &format!("/api/files/{}", file_id), None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["content"], "fn main() {}");
    assert_eq!(body["data"]["path"], "src/main.rs");

    // Update
    let response = app
        .clone()
        .oneshot(authed(
            Method::PUT,
            &format!("/api/files/{}", file_id),
            Some(json!({"content": "fn main() { println!(); }"})),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["success"], true);

    // List
    let response = app
        .clone()
        .oneshot(authed(Method::GET, "/api/projects/proj-1/files", None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Delete, then read must 404
    let response = app
        .clone()
        .oneshot(authed(Method::DELETE, &format!("/api/files/{}", file_id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(authed(Method::GET, &format!("/api/files/{}", file_id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error_kind"], "not_found");
}

#[tokio::test]
async fn storage_actions_save_and_load_by_path() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(authed(
            Method::POST,
            "/api/storage",
            Some(json!({
                "action": "save-file",
                "projectId": "proj-1",
                "filePath": "notes/todo.md",
                "content": "- ship it",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(authed(
            Method::POST,
            "/api/storage",
            Some(json!({
                "action": "load-file",
                "projectId": "proj-1",
                "filePath": "notes/todo.md",
            })),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["content"], "- ship it");
}

#[tokio::test]
async fn sync_without_mirror_is_a_write_failure() {
    let app = test_app().await;

    let response = app
        .oneshot(authed(
            Method::POST,
            "/api/storage",
            Some(json!({"action": "sync-project", "projectId": "proj-1"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error_kind"], "storage_write_failed");
}

#[tokio::test]
async fn instance_and_terminal_lifecycle() {
    let app = test_app().await;

    // Acquire an instance
    let response = app
        .clone()
        .oneshot(authed(
            Method::POST,
            "/api/sandbox/instances",
            Some(json!({"projectId": "proj-1"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["status"], "ready");
    let instance_id = body["data"]["id"].as_str().unwrap().to_string();

    // Write and read a file inside the sandbox
    let response = app
        .clone()
        .oneshot(authed(
            Method::POST,
            &format!("/api/sandbox/instances/{}/fs/write", instance_id),
            Some(json!({"path": "index.js", "content": "console.log(1)", "encoding": "utf8"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(authed(
            Method::POST,
            &format!("/api/sandbox/instances/{}/fs/read", instance_id),
            Some(json!({"path": "index.js"})),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["content"], "console.log(1)");

    // Start a terminal session and drive it
    let response = app
        .clone()
        .oneshot(authed(
            Method::POST,
            "/api/terminal/sessions",
            Some(json!({
                "instanceId": instance_id,
                "projectId": "proj-1",
                "terminalSize": {"cols": 100, "rows": 30},
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let session_id = body["data"]["sessionId"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["processId"], "exec-1");

    let response = app
        .clone()
        .oneshot(authed(
            Method::POST,
            &format!("/api/terminal/sessions/{}/input", session_id),
            Some(json!({"data": "ls\n"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(authed(
            Method::POST,
            &format!("/api/terminal/sessions/{}/resize", session_id),
            Some(json!({"cols": 120, "rows": 40})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Stop, then further input is a session_not_found
    let response = app
        .clone()
        .oneshot(authed(
            Method::DELETE,
            &format!("/api/terminal/sessions/{}", session_id),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(authed(
            Method::POST,
            &format!("/api/terminal/sessions/{}/input", session_id),
            Some(json!({"data": "ls\n"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error_kind"], "session_not_found");
}

#[tokio::test]
async fn release_then_status_shows_terminated() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(authed(
            Method::POST,
            "/api/sandbox/instances",
            Some(json!({"projectId": "proj-1"})),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    let instance_id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(authed(
            Method::PUT,
            &format!("/api/sandbox/instances/{}/preview", instance_id),
            Some(json!({"previewUrl": "http://localhost:3000", "port": 3000})),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["previewUrl"], "http://localhost:3000");

    let response = app
        .clone()
        .oneshot(authed(
            Method::DELETE,
            &format!("/api/sandbox/instances/{}", instance_id),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(authed(
            Method::GET,
            &format!("/api/sandbox/instances/{}", instance_id),
            None,
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["status"], "terminated");
}

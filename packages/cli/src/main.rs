// ABOUTME: Entry point for the Atelier server
// ABOUTME: Loads configuration, initializes stores and runtime, serves the API

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::Method;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use atelier_api::{create_router, sse::SseConnectionTracker, AppState, AuthConfig};
use atelier_config::{SandboxConfig, ServerConfig, StorageConfig};
use atelier_sandbox::{
    DockerRuntime, InstanceRegistry, InstanceStore, SandboxRuntime, SessionStore,
    TerminalSessionManager,
};
use atelier_storage::{
    FileStore, GitHubMirror, PlacementPolicy, RemoteMirror, S3BlobStore, StorageManager,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let server_config = ServerConfig::from_env();
    let storage_config = StorageConfig::from_env();
    let sandbox_config = SandboxConfig::from_env();

    println!("🚀 Starting Atelier server...");
    println!("📡 Server will run on http://localhost:{}", server_config.port);
    println!("🔗 CORS origin: {}", server_config.cors_origin);

    // Database pool + schema
    let connect_options = SqliteConnectOptions::new()
        .filename(&storage_config.db_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await
        .context("failed to open database")?;

    let file_store = FileStore::new(pool.clone());
    file_store.init_schema().await.context("files schema")?;
    let instance_store = InstanceStore::new(pool.clone());
    instance_store.init_schema().await.context("instances schema")?;
    let session_store = SessionStore::new(pool.clone());
    session_store.init_schema().await.context("sessions schema")?;

    // Storage backends
    let blob = Arc::new(
        S3BlobStore::connect(&storage_config)
            .await
            .context("blob store (set ATELIER_BLOB_BUCKET and credentials)")?,
    );

    let mirror: Option<Arc<dyn RemoteMirror>> =
        match (&storage_config.github_token, &storage_config.github_owner) {
            (Some(token), Some(owner)) => Some(Arc::new(GitHubMirror::new(
                storage_config.github_api_url.clone(),
                owner.clone(),
                token.clone(),
            ))),
            _ => {
                warn!("Remote mirror disabled: ATELIER_GITHUB_TOKEN / ATELIER_GITHUB_OWNER not set");
                None
            }
        };

    let storage = Arc::new(StorageManager::new(
        file_store,
        blob,
        mirror,
        PlacementPolicy::new(storage_config.inline_threshold_bytes),
    ));

    // Sandbox runtime and registries
    let runtime: Arc<dyn SandboxRuntime> = Arc::new(
        DockerRuntime::connect(sandbox_config.clone())
            .await
            .context("sandbox runtime (is the Docker daemon running?)")?,
    );
    let registry = Arc::new(InstanceRegistry::new(
        runtime.clone(),
        instance_store,
        sandbox_config,
    ));
    let terminals = Arc::new(TerminalSessionManager::new(runtime.clone(), session_store));

    let state = AppState {
        storage,
        registry,
        terminals,
        runtime,
        sse_tracker: SseConnectionTracker::new(),
        auth: AuthConfig {
            api_token: server_config.api_token.clone(),
            dev_mode: server_config.dev_mode,
        },
    };

    // Create CORS layer
    let cors = CorsLayer::new()
        .allow_origin(server_config.cors_origin.parse::<axum::http::HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([127, 0, 0, 1], server_config.port));
    println!("✅ Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

// ABOUTME: Typed runtime configuration loaded from environment variables
// ABOUTME: Every knob has a validated parse and a documented default

pub mod constants;

use constants::*;

/// Default inline-vs-blob threshold: 100 KiB.
pub const DEFAULT_INLINE_THRESHOLD_BYTES: u64 = 100 * 1024;

/// Default back-off before re-checking after a boot conflict.
pub const DEFAULT_BOOT_BACKOFF_MS: u64 = 500;

/// Default bound on waiting for another caller's in-flight boot.
pub const DEFAULT_BOOT_WAIT_TIMEOUT_MS: u64 = 15_000;

/// Default container image for sandbox instances.
pub const DEFAULT_SANDBOX_IMAGE: &str = "node:20-bookworm-slim";

/// Fixed container name for the single runtime-wide sandbox instance.
pub const DEFAULT_SANDBOX_CONTAINER: &str = "atelier-sandbox";

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Storage layer configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// SQLite database path (":memory:" for ephemeral)
    pub db_path: String,
    /// Content at or below this size stays inline in the database
    pub inline_threshold_bytes: u64,
    pub blob_bucket: Option<String>,
    pub blob_region: String,
    pub blob_endpoint: Option<String>,
    pub blob_prefix: String,
    pub github_token: Option<String>,
    pub github_owner: Option<String>,
    pub github_api_url: String,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self {
            db_path: env_string(ATELIER_DB_PATH).unwrap_or_else(|| "atelier.db".to_string()),
            inline_threshold_bytes: env_parse::<u64>(ATELIER_INLINE_THRESHOLD_BYTES)
                .filter(|&v| v > 0)
                .unwrap_or(DEFAULT_INLINE_THRESHOLD_BYTES),
            blob_bucket: env_string(ATELIER_BLOB_BUCKET),
            blob_region: env_string(ATELIER_BLOB_REGION).unwrap_or_else(|| "auto".to_string()),
            blob_endpoint: env_string(ATELIER_BLOB_ENDPOINT),
            blob_prefix: env_string(ATELIER_BLOB_PREFIX)
                .unwrap_or_else(|| "atelier-files/".to_string()),
            github_token: env_string(ATELIER_GITHUB_TOKEN),
            github_owner: env_string(ATELIER_GITHUB_OWNER),
            github_api_url: env_string(ATELIER_GITHUB_API_URL)
                .unwrap_or_else(|| "https://api.github.com".to_string()),
        }
    }
}

/// Sandbox runtime configuration
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub image: String,
    /// Fixed name of the single instance container
    pub container_name: String,
    pub boot_backoff_ms: u64,
    pub boot_wait_timeout_ms: u64,
}

impl SandboxConfig {
    pub fn from_env() -> Self {
        Self {
            image: env_string(ATELIER_SANDBOX_IMAGE)
                .unwrap_or_else(|| DEFAULT_SANDBOX_IMAGE.to_string()),
            container_name: env_string(ATELIER_SANDBOX_CONTAINER)
                .unwrap_or_else(|| DEFAULT_SANDBOX_CONTAINER.to_string()),
            boot_backoff_ms: env_parse::<u64>(ATELIER_BOOT_BACKOFF_MS)
                .filter(|&v| v > 0 && v <= 60_000)
                .unwrap_or(DEFAULT_BOOT_BACKOFF_MS),
            boot_wait_timeout_ms: env_parse::<u64>(ATELIER_BOOT_WAIT_TIMEOUT_MS)
                .filter(|&v| v > 0)
                .unwrap_or(DEFAULT_BOOT_WAIT_TIMEOUT_MS),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_SANDBOX_IMAGE.to_string(),
            container_name: DEFAULT_SANDBOX_CONTAINER.to_string(),
            boot_backoff_ms: DEFAULT_BOOT_BACKOFF_MS,
            boot_wait_timeout_ms: DEFAULT_BOOT_WAIT_TIMEOUT_MS,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origin: String,
    /// Static API token; absent in dev mode means header-based identity
    pub api_token: Option<String>,
    pub dev_mode: bool,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_parse::<u16>(ATELIER_API_PORT).unwrap_or(4800),
            cors_origin: env_string(ATELIER_CORS_ORIGIN)
                .unwrap_or_else(|| "http://localhost:5173".to_string()),
            api_token: env_string(ATELIER_API_TOKEN),
            dev_mode: env_parse::<bool>(ATELIER_DEV_MODE).unwrap_or(false),
        }
    }
}

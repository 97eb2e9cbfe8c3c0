// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Atelier

// Server Configuration
pub const ATELIER_API_PORT: &str = "ATELIER_API_PORT";
pub const ATELIER_CORS_ORIGIN: &str = "ATELIER_CORS_ORIGIN";

// Storage Configuration
pub const ATELIER_DB_PATH: &str = "ATELIER_DB_PATH";
pub const ATELIER_INLINE_THRESHOLD_BYTES: &str = "ATELIER_INLINE_THRESHOLD_BYTES";

// Blob Store (S3-compatible)
pub const ATELIER_BLOB_BUCKET: &str = "ATELIER_BLOB_BUCKET";
pub const ATELIER_BLOB_REGION: &str = "ATELIER_BLOB_REGION";
pub const ATELIER_BLOB_ENDPOINT: &str = "ATELIER_BLOB_ENDPOINT";
pub const ATELIER_BLOB_PREFIX: &str = "ATELIER_BLOB_PREFIX";

// Remote Mirror (GitHub)
pub const ATELIER_GITHUB_TOKEN: &str = "ATELIER_GITHUB_TOKEN";
pub const ATELIER_GITHUB_OWNER: &str = "ATELIER_GITHUB_OWNER";
pub const ATELIER_GITHUB_API_URL: &str = "ATELIER_GITHUB_API_URL";

// Sandbox Runtime
pub const ATELIER_SANDBOX_IMAGE: &str = "ATELIER_SANDBOX_IMAGE";
pub const ATELIER_SANDBOX_CONTAINER: &str = "ATELIER_SANDBOX_CONTAINER";
pub const ATELIER_BOOT_BACKOFF_MS: &str = "ATELIER_BOOT_BACKOFF_MS";
pub const ATELIER_BOOT_WAIT_TIMEOUT_MS: &str = "ATELIER_BOOT_WAIT_TIMEOUT_MS";

// Streaming
pub const ATELIER_SSE_MAX_CONNECTIONS_PER_IP: &str = "ATELIER_SSE_MAX_CONNECTIONS_PER_IP";

// Auth
pub const ATELIER_API_TOKEN: &str = "ATELIER_API_TOKEN";
pub const ATELIER_DEV_MODE: &str = "ATELIER_DEV_MODE";

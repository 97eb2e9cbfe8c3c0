// ABOUTME: Input validation utilities for API request handlers
// ABOUTME: Field-specific checks for ids, project paths and content sizes

use crate::response::ApiError;

/// Maximum size for file content accepted over the API (10 MiB)
pub const MAX_CONTENT_SIZE: usize = 10 * 1024 * 1024;

/// Maximum length for a project-relative path
pub const MAX_PATH_LENGTH: usize = 4096;

/// Maximum size for identifiers
pub const MAX_ID_SIZE: usize = 255;

/// Validate an opaque identifier (project, file, instance, session)
pub fn validate_id(value: &str, field: &str) -> Result<(), ApiError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{} cannot be empty", field)));
    }

    if trimmed.len() > MAX_ID_SIZE {
        return Err(ApiError::Validation(format!(
            "{} exceeds maximum size of {} characters",
            field, MAX_ID_SIZE
        )));
    }

    if trimmed.contains('\0') {
        return Err(ApiError::Validation(format!(
            "{} contains invalid null bytes",
            field
        )));
    }

    Ok(())
}

/// Validate a project-relative file path
pub fn validate_path(path: &str) -> Result<String, ApiError> {
    let trimmed = path.trim().trim_start_matches('/');

    if trimmed.is_empty() {
        return Err(ApiError::Validation("path cannot be empty".to_string()));
    }

    if trimmed.len() > MAX_PATH_LENGTH {
        return Err(ApiError::Validation(format!(
            "path exceeds maximum length of {} characters",
            MAX_PATH_LENGTH
        )));
    }

    if trimmed.contains('\0') {
        return Err(ApiError::Validation("path contains invalid null bytes".to_string()));
    }

    // Reject traversal segments; paths are project-relative only
    if trimmed.split('/').any(|segment| segment == "..") {
        return Err(ApiError::Validation("path must not contain '..' segments".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Validate decoded content size
pub fn validate_content_size(size: usize) -> Result<(), ApiError> {
    if size > MAX_CONTENT_SIZE {
        return Err(ApiError::Validation(format!(
            "content exceeds maximum size of {} bytes (got {})",
            MAX_CONTENT_SIZE, size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ids_are_rejected() {
        assert!(validate_id("  ", "projectId").is_err());
        assert!(validate_id("proj-1", "projectId").is_ok());
    }

    #[test]
    fn traversal_paths_are_rejected() {
        assert!(validate_path("../etc/passwd").is_err());
        assert!(validate_path("src/../../etc").is_err());
        assert!(validate_path("src/app..tsx").is_ok());
    }

    #[test]
    fn leading_slash_is_normalized() {
        assert_eq!(validate_path("/src/main.rs").unwrap(), "src/main.rs");
    }

    #[test]
    fn oversized_content_is_rejected() {
        assert!(validate_content_size(MAX_CONTENT_SIZE).is_ok());
        assert!(validate_content_size(MAX_CONTENT_SIZE + 1).is_err());
    }
}

// ABOUTME: Authentication context for API requests
// ABOUTME: Bearer-token or dev-header identity; absence yields an unauthorized response

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::response::ApiError;

/// Identity header consulted for the caller's user id
const USER_HEADER: &str = "x-atelier-user";

/// Auth settings shared with the router state
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Static API token; when set, requests must carry it as a bearer token
    pub api_token: Option<String>,
    /// Dev mode accepts a bare identity header without a token
    pub dev_mode: bool,
}

/// Current authenticated user
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn user_header(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AuthConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AuthConfig::from_ref(state);

        if let Some(expected) = &config.api_token {
            match bearer_token(parts) {
                Some(token) if token == expected => {
                    return Ok(Self {
                        id: user_header(parts).unwrap_or_else(|| "default-user".to_string()),
                    });
                }
                Some(_) => {
                    return Err(ApiError::Unauthorized("invalid API token".to_string()));
                }
                None => {
                    return Err(ApiError::Unauthorized("missing bearer token".to_string()));
                }
            }
        }

        if config.dev_mode {
            return match user_header(parts) {
                Some(id) => Ok(Self { id }),
                None => Err(ApiError::Unauthorized(format!(
                    "missing {} header",
                    USER_HEADER
                ))),
            };
        }

        Err(ApiError::Unauthorized(
            "no authentication configured; set an API token or enable dev mode".to_string(),
        ))
    }
}

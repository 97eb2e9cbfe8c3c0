// ABOUTME: HTTP request handlers for terminal session lifecycle and output streaming
// ABOUTME: start/input/resize/stop plus the SSE relay of process output

use std::convert::Infallible;
use std::net::SocketAddr;

use async_stream::stream;
use axum::{
    extract::{ConnectInfo, Path, State},
    response::sse::{Event, Sse},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use atelier_sandbox::{forward_output, TerminalEvent, TerminalSize};

use crate::auth::CurrentUser;
use crate::files_handlers::{decode_content, ContentEncoding};
use crate::response::{ApiError, ApiResponse};
use crate::sse::{create_error_event, create_sse_response, GuardedSseStream};
use crate::validation::validate_id;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    #[serde(alias = "webContainerId")]
    pub instance_id: String,
    pub project_id: String,
    pub session_id: Option<String>,
    pub terminal_size: Option<TerminalSize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: String,
    pub process_id: String,
}

/// POST /api/terminal/sessions
pub async fn start_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<ApiResponse<StartSessionResponse>>, ApiError> {
    validate_id(&request.instance_id, "instanceId")?;
    validate_id(&request.project_id, "projectId")?;
    if let Some(session_id) = &request.session_id {
        validate_id(session_id, "sessionId")?;
    }

    let runtime_id = state.registry.runtime_id(&request.instance_id).await?;
    let session = state
        .terminals
        .start(
            &runtime_id,
            &request.instance_id,
            &request.project_id,
            &user.id,
            request.session_id,
            request.terminal_size,
        )
        .await?;

    Ok(Json(ApiResponse::success(StartSessionResponse {
        session_id: session.id,
        process_id: session.process_id,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInputRequest {
    pub data: String,
    #[serde(default)]
    pub encoding: ContentEncoding,
}

/// POST /api/terminal/sessions/{id}/input
pub async fn session_input(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(session_id): Path<String>,
    Json(request): Json<SessionInputRequest>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    validate_id(&session_id, "sessionId")?;
    let data = decode_content(&request.data, request.encoding)?;

    state.terminals.write(&session_id, &data).await?;
    Ok(Json(ApiResponse::success("ok")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeRequest {
    pub cols: u16,
    pub rows: u16,
}

/// POST /api/terminal/sessions/{id}/resize
pub async fn resize_session(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(session_id): Path<String>,
    Json(request): Json<ResizeRequest>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    validate_id(&session_id, "sessionId")?;
    state
        .terminals
        .resize(&session_id, request.cols, request.rows)
        .await?;
    Ok(Json(ApiResponse::success("ok")))
}

/// DELETE /api/terminal/sessions/{id}
pub async fn stop_session(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    validate_id(&session_id, "sessionId")?;
    state.terminals.stop(&session_id).await?;
    info!("Stopped terminal session {}", session_id);
    Ok(Json(ApiResponse::success("Session stopped")))
}

/// GET /api/terminal/sessions/{id}/stream
///
/// Relays the session's process output as SSE events: `output` (base64
/// chunks), `exit` on end-of-output, `error` on a read failure. The exclusive
/// read lease travels with the response stream; a client disconnect drops it
/// and frees the session for the next subscriber.
pub async fn stream_session_output(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(session_id): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    validate_id(&session_id, "sessionId")?;

    let guard = state
        .sse_tracker
        .try_acquire(addr.ip())
        .map_err(|_| ApiError::Validation("too many concurrent streams from this address".to_string()))?;

    let lease = state.terminals.take_output(&session_id).await?;
    let terminals = state.terminals.clone();
    let stream_session_id = session_id.clone();

    let events = stream! {
        let mut source = forward_output(lease);
        while let Some(event) = source.next().await {
            match event {
                TerminalEvent::Output(chunk) => {
                    yield Ok::<Event, Infallible>(
                        Event::default().event("output").data(BASE64.encode(&chunk)),
                    );
                }
                TerminalEvent::Exit => {
                    if let Err(e) = terminals.mark_exited(&stream_session_id).await {
                        warn!("Failed to mark session {} exited: {}", stream_session_id, e);
                    }
                    yield Ok(Event::default().event("exit").data("{}"));
                    break;
                }
                TerminalEvent::Error(message) => {
                    yield Ok(create_error_event(&message));
                    break;
                }
            }
        }
    };

    info!("Streaming output for session {} to {}", session_id, addr);
    Ok(create_sse_response(GuardedSseStream::new(events, guard)))
}

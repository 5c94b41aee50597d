//! Session management handlers.

use crate::{
    auth::middleware::AuthUser,
    types::{
        AppError, CreateSessionRequest, MessageOut, Result, SessionOut, StoredMessage,
        UpdateSessionRequest,
    },
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use base64::Engine;
use serde::Deserialize;
use utoipa::IntoParams;

/// Upper bound on messages returned by the history endpoint.
pub const MAX_HISTORY_MESSAGES: usize = 500;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Maximum number of messages, capped at 500
    pub limit: Option<usize>,
}

impl From<StoredMessage> for MessageOut {
    fn from(m: StoredMessage) -> Self {
        let (image_base64, image_mime) = match m.attachment {
            Some(att) => (
                Some(base64::engine::general_purpose::STANDARD.encode(&att.bytes)),
                Some(att.mime),
            ),
            None => (None, None),
        };

        Self {
            id: m.id,
            role: m.role,
            content: m.text,
            image_base64,
            image_mime,
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

/// List the caller's sessions, most recently updated first.
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Sessions of the caller", body = Vec<SessionOut>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "sessions",
    security(("bearer" = []))
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<SessionOut>>> {
    let sessions = state.chat.store().list_sessions(&user_id).await?;
    Ok(Json(sessions.into_iter().map(SessionOut::from).collect()))
}

/// Create a session. The title defaults to "New chat".
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionOut),
        (status = 401, description = "Unauthorized")
    ),
    tag = "sessions",
    security(("bearer" = []))
)]
pub async fn create_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Option<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<SessionOut>)> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let session = state
        .chat
        .store()
        .create_session(&user_id, request.title.as_deref())
        .await?;

    tracing::info!(session_id = %session.id, "Session created");
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// Rename a session.
#[utoipa::path(
    patch,
    path = "/sessions/{id}",
    params(("id" = String, Path, description = "Session ID")),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, description = "Session renamed", body = SessionOut),
        (status = 400, description = "Blank title"),
        (status = 404, description = "Session not found"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "sessions",
    security(("bearer" = []))
)]
pub async fn update_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateSessionRequest>,
) -> Result<Json<SessionOut>> {
    if payload.title.trim().is_empty() {
        return Err(AppError::InvalidInput("title must not be empty".to_string()));
    }

    state
        .chat
        .store()
        .update_session_title(&user_id, &id, &payload.title)
        .await?
        .map(|s| Json(s.into()))
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))
}

/// Delete a session with its messages and summary.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 404, description = "Session not found"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "sessions",
    security(("bearer" = []))
)]
pub async fn delete_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if state.chat.store().delete_session(&user_id, &id).await? {
        tracing::info!(session_id = %id, "Session deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Session not found".to_string()))
    }
}

/// Message history of a session, oldest first, with images inlined as base64.
#[utoipa::path(
    get,
    path = "/sessions/{id}/messages",
    params(("id" = String, Path, description = "Session ID"), HistoryQuery),
    responses(
        (status = 200, description = "Messages in storage order", body = Vec<MessageOut>),
        (status = 404, description = "Session not found"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "sessions",
    security(("bearer" = []))
)]
pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageOut>>> {
    let store = state.chat.store();
    if store.get_session(&user_id, &id).await?.is_none() {
        return Err(AppError::NotFound("Session not found".to_string()));
    }

    let limit = query
        .limit
        .unwrap_or(MAX_HISTORY_MESSAGES)
        .min(MAX_HISTORY_MESSAGES);
    let messages = store.all_messages(&user_id, &id, limit).await?;

    Ok(Json(messages.into_iter().map(MessageOut::from).collect()))
}

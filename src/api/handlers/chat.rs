//! Streaming chat and title generation handlers.

use crate::{
    auth::middleware::AuthUser,
    chat::{decode_attachment, TurnRequest, TurnStream},
    types::{ChatRequest, Result, TitleRequest},
    AppState,
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

fn text_stream(stream: TurnStream) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Submit a turn and stream the assistant reply as plain text.
///
/// Validation and session lookup failures are returned before any output.
/// A provider failure mid-stream ends the body early; text already sent is kept.
#[utoipa::path(
    post,
    path = "/chat/stream",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Reply fragments as they are generated", content_type = "text/plain"),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Session not found"),
        (status = 502, description = "Completion provider failed"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "chat",
    security(("bearer" = []))
)]
pub async fn chat_stream(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChatRequest>,
) -> Result<Response> {
    let attachment = decode_attachment(
        payload.image_base64.as_deref(),
        payload.image_mime.as_deref(),
    )?;

    let stream = state
        .chat
        .submit_turn(
            &user_id,
            TurnRequest {
                session_id: payload.session_id,
                text: payload.message,
                attachment,
                model: payload.model,
            },
        )
        .await?;

    Ok(text_stream(stream))
}

/// Stream a generated title; it replaces the session title once complete.
#[utoipa::path(
    post,
    path = "/sessions/{id}/title",
    params(("id" = String, Path, description = "Session ID")),
    request_body = TitleRequest,
    responses(
        (status = 200, description = "Title fragments", content_type = "text/plain"),
        (status = 400, description = "Empty prompt"),
        (status = 404, description = "Session not found"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "chat",
    security(("bearer" = []))
)]
pub async fn generate_title(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<TitleRequest>,
) -> Result<Response> {
    let stream = state
        .chat
        .generate_title(&user_id, &id, &payload.prompt, payload.model.as_deref())
        .await?;

    Ok(text_stream(stream))
}

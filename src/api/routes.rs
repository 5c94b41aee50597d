use crate::api::handlers::{self, chat, sessions, usage};
use crate::AppState;
use axum::{
    routing::{get, patch, post},
    Json, Router,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Mnemo API", description = "Conversational memory server"),
    paths(
        handlers::health_check,
        sessions::list_sessions,
        sessions::create_session,
        sessions::update_session,
        sessions::delete_session,
        sessions::list_messages,
        chat::chat_stream,
        chat::generate_title,
        usage::my_tokens,
    ),
    components(schemas(
        crate::types::ChatRequest,
        crate::types::TitleRequest,
        crate::types::CreateSessionRequest,
        crate::types::UpdateSessionRequest,
        crate::types::SessionOut,
        crate::types::MessageOut,
        crate::types::MessageRole,
        crate::types::TokenReport,
        crate::types::ModelUsage,
        handlers::HealthResponse,
    )),
    tags(
        (name = "sessions", description = "Session management"),
        (name = "chat", description = "Streaming chat"),
        (name = "usage", description = "Token accounting"),
        (name = "health", description = "Liveness"),
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// All routes. Identity is resolved per handler through the `AuthUser` extractor.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .route(
            "/sessions",
            get(sessions::list_sessions).post(sessions::create_session),
        )
        .route(
            "/sessions/{id}",
            patch(sessions::update_session).delete(sessions::delete_session),
        )
        .route("/sessions/{id}/messages", get(sessions::list_messages))
        .route("/sessions/{id}/title", post(chat::generate_title))
        .route("/chat/stream", post(chat::chat_stream))
        .route("/me/tokens", get(usage::my_tokens))
}

//! # Mnemo
//!
//! Conversational memory for a multimodal streaming chat service.
//!
//! Every turn is answered from a bounded context: a fixed system instruction,
//! a rolling summary of older history and the last few messages verbatim.
//! Replies stream to the caller as they are generated and are committed to
//! storage exactly once, whether the stream is drained, dropped or cut short
//! by the provider.
//!
//! ## Modules
//!
//! - [`chat`] - turn submission and title generation
//! - [`memory`] - context assembly, normalization, summaries and turn finalization
//! - [`db`] - the [`ChatStore`](db::ChatStore) seam and its libsql implementation
//! - [`llm`] - the streaming completion client
//! - [`api`] / [`auth`] - HTTP surface and caller identity
//! - [`utils`] - `mnemo.toml` configuration
//!
//! ## Library use
//!
//! ```rust,ignore
//! use mnemo::{AppState, create_app, utils::toml_config::AppConfig};
//!
//! let config = AppConfig::load("mnemo.toml")?;
//! let store = mnemo::db::DatabaseProvider::from_config(&config.database).create_store().await?;
//! let llm = mnemo::llm::Provider::OpenAI { .. }.create_client()?;
//! let app = create_app(AppState::new(config, store, llm));
//! ```

/// HTTP API handlers and routes.
pub mod api;
/// Caller identity (JWT and the request extractor).
pub mod auth;
/// Turn submission and title generation.
pub mod chat;
/// Command-line interface.
pub mod cli;
/// Relational storage.
pub mod db;
/// Completion provider clients.
pub mod llm;
/// Windowing, summaries and turn finalization.
pub mod memory;
/// Core types (requests, responses, records, errors).
pub mod types;
/// Configuration.
pub mod utils;

pub use chat::ChatService;
pub use db::{ChatStore, TursoClient};
pub use llm::{LLMClient, LLMResponse, Provider};
pub use types::{AppError, Result};
pub use utils::toml_config::AppConfig;

use crate::auth::jwt::AuthService;
use axum::extract::{DefaultBodyLimit, FromRef};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub chat: ChatService,
    pub auth_service: Arc<AuthService>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn ChatStore>, llm: Arc<dyn LLMClient>) -> Self {
        let auth_service = Arc::new(AuthService::new(
            config.jwt_secret(),
            config.auth.jwt_access_expiry,
            config.anonymous_user(),
        ));
        let chat = ChatService::new(
            store,
            llm,
            config.memory_policy(),
            config.upload_limits(),
        );

        Self {
            config: Arc::new(config),
            chat,
            auth_service,
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth_service.clone()
    }
}

/// Largest accepted request body: a base64 image plus room for the JSON around it.
fn body_limit(max_image_bytes: usize) -> usize {
    max_image_bytes.saturating_mul(4) / 3 + 64 * 1024
}

/// The full HTTP application with tracing, CORS and body size limits applied.
///
/// The limit replaces axum's 2 MiB default for the `Json` extractor, so image
/// uploads are bounded by `uploads.max_image_bytes` alone.
pub fn create_app(state: AppState) -> Router {
    let limit = body_limit(state.config.uploads.max_image_bytes);

    api::routes::create_router()
        .layer(DefaultBodyLimit::max(limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

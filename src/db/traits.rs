//! Database abstraction traits
//!
//! This module provides the `ChatStore` trait that abstracts over different
//! database backends (in-memory SQLite, file-based SQLite, remote Turso).
//! The chat pipeline only ever talks to a `dyn ChatStore`, so the storage
//! engine stays an external collaborator.
//!
//! # Example
//!
//! ```rust,ignore
//! use mnemo::db::DatabaseProvider;
//!
//! // Use in-memory database (default for development/testing)
//! let store = DatabaseProvider::Memory.create_store().await?;
//!
//! // Use file-based SQLite
//! let store = DatabaseProvider::SQLite { path: "data.db".into() }.create_store().await?;
//! ```

use crate::types::{ChatSession, ModelUsage, NewMessage, Result, StoredMessage, TokenUsage};
use crate::utils::toml_config::DatabaseConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// Database provider configuration
#[derive(Debug, Clone, Default)]
pub enum DatabaseProvider {
    /// In-memory SQLite database (ephemeral, lost on restart)
    #[default]
    Memory,
    /// File-based SQLite database
    SQLite {
        /// Path to the SQLite database file
        path: String,
    },
    /// Remote Turso database (requires network access)
    Turso {
        /// The Turso database URL (e.g., `libsql://your-db.turso.io`)
        url: String,
        /// Authentication token for the Turso database
        auth_token: String,
    },
}

impl DatabaseProvider {
    /// Create a store from this provider configuration
    pub async fn create_store(&self) -> Result<Arc<dyn ChatStore>> {
        match self {
            DatabaseProvider::Memory => {
                let client = super::turso::TursoClient::new_memory().await?;
                Ok(Arc::new(client))
            }
            DatabaseProvider::SQLite { path } => {
                let client = super::turso::TursoClient::new_local(path).await?;
                Ok(Arc::new(client))
            }
            DatabaseProvider::Turso { url, auth_token } => {
                let client =
                    super::turso::TursoClient::new_remote(url.clone(), auth_token.clone()).await?;
                Ok(Arc::new(client))
            }
        }
    }

    /// Resolve the provider from the `[database]` config section.
    ///
    /// Turso wins when both of its env vars are set and non-empty; otherwise
    /// `url` selects a SQLite file, with `:memory:` meaning in-memory.
    pub fn from_config(config: &DatabaseConfig) -> Self {
        let turso = config
            .turso_url_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .zip(
                config
                    .turso_token_env
                    .as_deref()
                    .and_then(|name| std::env::var(name).ok()),
            );

        if let Some((url, auth_token)) = turso {
            if !url.is_empty() && !auth_token.is_empty() {
                return DatabaseProvider::Turso { url, auth_token };
            }
        }

        if config.url.is_empty() || config.url == ":memory:" {
            DatabaseProvider::Memory
        } else {
            DatabaseProvider::SQLite {
                path: config.url.clone(),
            }
        }
    }
}

/// Storage operations consumed by the chat pipeline.
///
/// Every method is a single atomic local operation. Session-scoped reads and
/// writes always take the owning `user_id`, so a session belonging to another
/// user is indistinguishable from a missing one.
#[async_trait]
pub trait ChatStore: Send + Sync {
    // ============== Users ==============

    /// Insert the user row if it does not exist yet.
    async fn ensure_user(&self, user_id: &str) -> Result<()>;

    // ============== Sessions ==============

    /// Create a session together with its empty rolling summary.
    async fn create_session(&self, user_id: &str, title: Option<&str>) -> Result<ChatSession>;

    async fn get_session(&self, user_id: &str, session_id: &str) -> Result<Option<ChatSession>>;

    /// Sessions of a user, most recently updated first.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>>;

    /// Bump `updated_at`; replace the title only while it is still the default.
    async fn touch_session(
        &self,
        user_id: &str,
        session_id: &str,
        title_if_default: Option<&str>,
    ) -> Result<Option<ChatSession>>;

    /// Replace the title unconditionally. Returns `None` for unknown sessions
    /// or blank titles.
    async fn update_session_title(
        &self,
        user_id: &str,
        session_id: &str,
        title: &str,
    ) -> Result<Option<ChatSession>>;

    /// Delete a session with its messages and summary.
    async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<bool>;

    // ============== Messages ==============

    async fn append_message(
        &self,
        user_id: &str,
        session_id: &str,
        message: NewMessage,
    ) -> Result<StoredMessage>;

    /// The last `limit` messages, oldest first.
    async fn recent_messages(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>>;

    /// The first `limit` messages, oldest first.
    async fn all_messages(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>>;

    async fn count_assistant_messages(&self, user_id: &str, session_id: &str) -> Result<u64>;

    // ============== Rolling Summary ==============

    /// Current summary, empty when none was ever written.
    async fn get_summary(&self, user_id: &str, session_id: &str) -> Result<String>;

    async fn set_summary(&self, user_id: &str, session_id: &str, summary: &str) -> Result<()>;

    // ============== Token Usage ==============

    /// Add `usage` to the running (user, model) aggregate.
    async fn add_token_usage(&self, user_id: &str, model: &str, usage: TokenUsage) -> Result<()>;

    async fn get_token_usage(&self, user_id: &str) -> Result<Vec<ModelUsage>>;
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Title every session starts with until the first turn (or an explicit rename) replaces it.
pub const DEFAULT_SESSION_TITLE: &str = "New chat";

/// Hard cap on session titles, in characters.
pub const TITLE_MAX_CHARS: usize = 80;

/// Truncates a title to [`TITLE_MAX_CHARS`] characters (not bytes).
pub fn clamp_title(title: &str) -> String {
    title.chars().take(TITLE_MAX_CHARS).collect()
}

// ============= API Request/Response Types =============

/// One chat turn submitted by the transport.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Base64-encoded image payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_mime: Option<String>,
    /// Requested model; unknown or absent ids fall back to the default model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TitleRequest {
    /// Prompt the title is derived from (usually the first user message)
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateSessionRequest {
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionOut {
    pub id: String,
    pub title: String,
    /// RFC3339 formatted last update timestamp
    pub updated_at: String,
}

impl From<ChatSession> for SessionOut {
    fn from(s: ChatSession) -> Self {
        Self {
            id: s.id,
            title: s.title,
            updated_at: s.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageOut {
    pub id: String,
    pub role: MessageRole,
    pub content: Option<String>,
    pub image_base64: Option<String>,
    pub image_mime: Option<String>,
    /// RFC3339 formatted creation timestamp
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenReport {
    pub total: u64,
    pub by_model: BTreeMap<String, u64>,
    pub details: Vec<ModelUsage>,
}

// ============= Conversation Records =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

/// Binary attachment carried by a message, with its declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// A message about to be appended to a session.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: MessageRole,
    pub text: Option<String>,
    pub attachment: Option<Attachment>,
}

impl NewMessage {
    pub fn user(text: Option<String>, attachment: Option<Attachment>) -> Self {
        Self {
            role: MessageRole::User,
            text,
            attachment,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            text: Some(text.into()),
            attachment: None,
        }
    }
}

/// A persisted, immutable message.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub text: Option<String>,
    pub attachment: Option<Attachment>,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    /// Text content, if present and not blank.
    pub fn visible_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_SESSION_TITLE
    }
}

// ============= Token Accounting =============

/// Token counters reported by the completion provider for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prompt_tokens == 0 && self.completion_tokens == 0 && self.total_tokens == 0
    }
}

/// Running aggregate for one (user, model) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ModelUsage {
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

// ============= Authentication Types =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Database(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            AppError::LLM(_) => axum::http::StatusCode::BAD_GATEWAY,
            AppError::Auth(_) => axum::http::StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => axum::http::StatusCode::BAD_REQUEST,
            AppError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_title_counts_chars() {
        let long = "é".repeat(100);
        assert_eq!(clamp_title(&long).chars().count(), TITLE_MAX_CHARS);
        assert_eq!(clamp_title("short"), "short");
    }

    #[test]
    fn test_token_usage_empty() {
        assert!(TokenUsage::default().is_empty());
        assert!(!TokenUsage::new(3, 0).is_empty());
        assert_eq!(TokenUsage::new(10, 5).total_tokens, 15);
    }

    #[test]
    fn test_message_role_roundtrip_names() {
        assert_eq!(MessageRole::parse("user"), Some(MessageRole::User));
        assert_eq!(MessageRole::parse("assistant"), Some(MessageRole::Assistant));
        assert_eq!(MessageRole::parse("system"), None);
        assert_eq!(MessageRole::Assistant.as_str(), "assistant");
    }

    #[test]
    fn test_error_display() {
        let err = AppError::NotFound("Session not found".to_string());
        assert_eq!(err.to_string(), "Not found: Session not found");
    }
}

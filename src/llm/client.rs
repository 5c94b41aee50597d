//! LLM client abstraction, model allow-list and the provider-facing content model.

use crate::types::{AppError, Result, TokenUsage};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Models a turn may request. Anything else falls back to [`ChatModel::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChatModel {
    #[default]
    Gpt4oMini,
    Gpt4o,
    Gpt41Mini,
    Gpt41,
}

impl ChatModel {
    pub const ALL: [ChatModel; 4] = [
        ChatModel::Gpt4oMini,
        ChatModel::Gpt4o,
        ChatModel::Gpt41Mini,
        ChatModel::Gpt41,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatModel::Gpt4oMini => "gpt-4o-mini",
            ChatModel::Gpt4o => "gpt-4o",
            ChatModel::Gpt41Mini => "gpt-4.1-mini",
            ChatModel::Gpt41 => "gpt-4.1",
        }
    }

    /// Resolve a requested model id; unknown or absent ids become the default.
    pub fn resolve(requested: Option<&str>) -> Self {
        requested
            .map(str::trim)
            .and_then(|id| Self::ALL.into_iter().find(|m| m.as_str() == id))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Message content in the provider wire format: a plain string or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Plain text of the message, with image parts skipped.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// One event of a streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Incremental assistant text
    Delta(String),
    /// Token usage for the whole request, normally sent once at the end
    Usage(TokenUsage),
}

pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Fully drained completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LLMResponse {
    pub content: String,
    pub usage: TokenUsage,
}

/// Streaming completion provider.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Start a streamed completion over `messages`.
    async fn stream_chat(&self, messages: &[ChatMessage], model: ChatModel)
        -> Result<CompletionStream>;

    /// Drain a streamed completion into a single response.
    async fn complete(&self, messages: &[ChatMessage], model: ChatModel) -> Result<LLMResponse> {
        let mut stream = self.stream_chat(messages, model).await?;
        let mut response = LLMResponse::default();

        while let Some(chunk) = stream.next().await {
            match chunk? {
                StreamChunk::Delta(text) => response.content.push_str(&text),
                StreamChunk::Usage(usage) => response.usage = usage,
            }
        }

        Ok(response)
    }

    fn provider_name(&self) -> &str;
}

/// Provider selection, resolved from the `[llm]` config section.
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAI {
        api_key: String,
        api_base: String,
        request_timeout_secs: u64,
    },
}

impl Provider {
    pub fn create_client(&self) -> Result<std::sync::Arc<dyn LLMClient>> {
        match self {
            Provider::OpenAI {
                api_key,
                api_base,
                request_timeout_secs,
            } => {
                if api_key.is_empty() {
                    return Err(AppError::LLM("OpenAI API key is not set".to_string()));
                }
                Ok(std::sync::Arc::new(super::openai::OpenAIClient::new(
                    api_key.clone(),
                    api_base.clone(),
                    *request_timeout_secs,
                )?))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_model() {
        assert_eq!(ChatModel::resolve(Some("gpt-4o")), ChatModel::Gpt4o);
        assert_eq!(ChatModel::resolve(Some("gpt-4.1-mini")), ChatModel::Gpt41Mini);
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        assert_eq!(ChatModel::resolve(None), ChatModel::Gpt4oMini);
        assert_eq!(ChatModel::resolve(Some("gpt-99-ultra")), ChatModel::Gpt4oMini);
        assert_eq!(ChatModel::resolve(Some("")), ChatModel::Gpt4oMini);
    }

    #[test]
    fn test_multipart_wire_format() {
        let msg = ChatMessage {
            role: ChatRole::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: "what is this?".to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "data:image/png;base64,AAAA".to_string(),
                    },
                },
            ]),
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(
            json["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
        assert_eq!(msg.text(), "what is this?");
    }

    #[test]
    fn test_plain_text_wire_format() {
        let json = serde_json::to_value(ChatMessage::system("be brief")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "be brief"}));
    }
}

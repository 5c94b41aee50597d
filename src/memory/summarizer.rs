use crate::llm::{ChatMessage, ChatModel, LLMClient};
use crate::memory::IMAGE_PLACEHOLDER;
use crate::types::{Result, StoredMessage, TokenUsage};
use std::sync::Arc;
use tracing::{debug, info};

pub const SUMMARIZER_SYSTEM_PROMPT: &str = "You maintain the long-term memory of a chat \
conversation. Merge the previous memory with the recent messages into one concise, factual \
summary. Keep the user's goals, decisions, constraints and stated facts. Drop small talk and \
anything already resolved. Reply with the summary text only.";

/// A freshly produced summary and what it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryUpdate {
    pub summary: String,
    pub usage: TokenUsage,
}

/// Produces rolling summaries through the completion provider.
pub struct Summarizer {
    llm: Arc<dyn LLMClient>,
    model: ChatModel,
    max_chars: usize,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LLMClient>, model: ChatModel, max_chars: usize) -> Self {
        Self {
            llm,
            model,
            max_chars,
        }
    }

    pub fn model(&self) -> ChatModel {
        self.model
    }

    /// Merge `previous` with `window_text` into an updated summary.
    ///
    /// `previous` may be empty on the first refresh of a session. The result
    /// is trimmed and cut to `max_chars` characters.
    pub async fn summarize(&self, previous: &str, window_text: &str) -> Result<SummaryUpdate> {
        let previous = previous.trim();
        let prompt = format!(
            "Previous memory:\n{}\n\nRecent messages:\n{}",
            if previous.is_empty() { "(none)" } else { previous },
            window_text
        );

        let messages = vec![
            ChatMessage::system(SUMMARIZER_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];

        debug!(model = %self.model, window_chars = window_text.len(), "Requesting summary");
        let response = self.llm.complete(&messages, self.model).await?;

        let summary: String = response
            .content
            .trim()
            .chars()
            .take(self.max_chars)
            .collect::<String>()
            .trim_end()
            .to_string();

        info!(chars = summary.chars().count(), "Rolling summary produced");

        Ok(SummaryUpdate {
            summary,
            usage: response.usage,
        })
    }
}

/// Render a window as `role: text` lines for the summarizer.
///
/// Attachments never fail the rendering; they become [`IMAGE_PLACEHOLDER`].
pub fn render_window(window: &[StoredMessage]) -> String {
    window
        .iter()
        .map(|m| {
            let body = match (m.visible_text(), m.attachment.is_some()) {
                (Some(text), true) => format!("{} {}", text.trim(), IMAGE_PLACEHOLDER),
                (Some(text), false) => text.trim().to_string(),
                (None, true) => IMAGE_PLACEHOLDER.to_string(),
                (None, false) => String::new(),
            };
            format!("{}: {}", m.role.as_str(), body)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Attachment, MessageRole};
    use chrono::Utc;

    fn message(role: MessageRole, text: Option<&str>, image: bool) -> StoredMessage {
        StoredMessage {
            id: "m".to_string(),
            session_id: "s".to_string(),
            role,
            text: text.map(str::to_string),
            attachment: image.then(|| Attachment {
                bytes: vec![0xff, 0xd8],
                mime: "image/jpeg".to_string(),
            }),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_window_with_images() {
        let window = vec![
            message(MessageRole::User, Some("look at this"), true),
            message(MessageRole::Assistant, Some("A cat."), false),
            message(MessageRole::User, None, true),
        ];

        assert_eq!(
            render_window(&window),
            "user: look at this [image]\nassistant: A cat.\nuser: [image]"
        );
    }

    #[test]
    fn test_render_empty_window() {
        assert_eq!(render_window(&[]), "");
    }
}

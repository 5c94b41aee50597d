use crate::llm::ChatMessage;
use crate::memory::normalize::Normalizer;
use crate::memory::SYSTEM_PROMPT;
use crate::types::StoredMessage;

/// Label placed in front of the rolling summary in the second system item.
pub const SUMMARY_LABEL: &str = "Conversation memory (summary of earlier messages):";

/// Build the provider request for a turn.
///
/// Order is fixed: the system instruction, the summary item when the summary
/// is not blank, then `window` in storage order. The new user message is
/// already the last window entry since it is persisted before assembly.
pub fn assemble_context(
    summary: &str,
    window: &[StoredMessage],
    normalizer: &Normalizer,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(window.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));

    let summary = summary.trim();
    if !summary.is_empty() {
        messages.push(ChatMessage::system(format!("{}\n{}", SUMMARY_LABEL, summary)));
    }

    messages.extend(window.iter().map(|m| normalizer.normalize(m)));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRole;
    use crate::types::MessageRole;
    use chrono::Utc;

    fn text_message(role: MessageRole, text: &str) -> StoredMessage {
        StoredMessage {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: "s1".to_string(),
            role,
            text: Some(text.to_string()),
            attachment: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_first_turn_without_summary() {
        let window = vec![text_message(MessageRole::User, "Hello")];
        let items = assemble_context("", &window, &Normalizer::new(1024));

        assert_eq!(
            items,
            vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user("Hello")]
        );
    }

    #[test]
    fn test_summary_precedes_window() {
        let window = vec![
            text_message(MessageRole::User, "Where should I go?"),
            text_message(MessageRole::Assistant, "Kyoto is lovely."),
            text_message(MessageRole::User, "And food?"),
        ];
        let items = assemble_context(
            "User is planning a trip to Japan.",
            &window,
            &Normalizer::new(1024),
        );

        assert_eq!(items.len(), 5);
        assert_eq!(items[0], ChatMessage::system(SYSTEM_PROMPT));
        assert_eq!(items[1].role, ChatRole::System);
        assert!(items[1].text().contains("User is planning a trip to Japan."));
        assert_eq!(items[2], ChatMessage::user("Where should I go?"));
        assert_eq!(items[3], ChatMessage::assistant("Kyoto is lovely."));
        assert_eq!(items[4], ChatMessage::user("And food?"));
    }

    #[test]
    fn test_whitespace_summary_is_skipped() {
        let window = vec![text_message(MessageRole::User, "hi")];
        let items = assemble_context("  \n\t ", &window, &Normalizer::new(1024));
        assert_eq!(items.len(), 2);
    }
}

use crate::llm::{ChatMessage, ChatRole, ContentPart, ImageUrl, MessageContent};
use crate::types::{MessageRole, StoredMessage};
use base64::Engine;

const IMAGE_OMITTED: &str = "[image omitted]";

/// Maps stored messages onto provider content items.
///
/// Every message with an attachment becomes a list of typed parts (optional
/// text first, then an inline `data:` URL), not only the newest one.
/// Attachments above `max_image_bytes` are replaced by a text marker so a
/// single oversized legacy row cannot blow up every later request.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    max_image_bytes: usize,
}

impl Normalizer {
    pub fn new(max_image_bytes: usize) -> Self {
        Self { max_image_bytes }
    }

    pub fn normalize(&self, message: &StoredMessage) -> ChatMessage {
        let role = match message.role {
            MessageRole::User => ChatRole::User,
            MessageRole::Assistant => ChatRole::Assistant,
        };
        let text = message.visible_text();

        let content = match &message.attachment {
            None => MessageContent::Text(text.unwrap_or_default().to_string()),
            Some(attachment) => {
                let mut parts = Vec::with_capacity(2);
                if let Some(text) = text {
                    parts.push(ContentPart::Text {
                        text: text.to_string(),
                    });
                }

                if attachment.bytes.len() > self.max_image_bytes {
                    parts.push(ContentPart::Text {
                        text: IMAGE_OMITTED.to_string(),
                    });
                } else {
                    let encoded = base64::engine::general_purpose::STANDARD.encode(&attachment.bytes);
                    parts.push(ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:{};base64,{}", attachment.mime, encoded),
                        },
                    });
                }

                MessageContent::Parts(parts)
            }
        };

        ChatMessage { role, content }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Attachment;
    use chrono::Utc;

    fn stored(role: MessageRole, text: Option<&str>, image: Option<&[u8]>) -> StoredMessage {
        StoredMessage {
            id: "m1".to_string(),
            session_id: "s1".to_string(),
            role,
            text: text.map(str::to_string),
            attachment: image.map(|bytes| Attachment {
                bytes: bytes.to_vec(),
                mime: "image/png".to_string(),
            }),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_text_only_is_plain_text() {
        let msg = Normalizer::new(1024).normalize(&stored(MessageRole::User, Some("Hello"), None));
        assert_eq!(msg, ChatMessage::user("Hello"));
    }

    #[test]
    fn test_text_and_image_keeps_order() {
        let msg = Normalizer::new(1024).normalize(&stored(
            MessageRole::User,
            Some("what is this?"),
            Some(&[1, 2, 3]),
        ));

        match msg.content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(
                    parts[0],
                    ContentPart::Text {
                        text: "what is this?".to_string()
                    }
                );
                assert_eq!(
                    parts[1],
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: "data:image/png;base64,AQID".to_string()
                        }
                    }
                );
            }
            other => panic!("expected parts, got {:?}", other),
        }
    }

    #[test]
    fn test_image_only_has_no_text_block() {
        let msg = Normalizer::new(1024).normalize(&stored(MessageRole::User, None, Some(&[1, 2, 3])));
        match msg.content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 1);
                assert!(matches!(parts[0], ContentPart::ImageUrl { .. }));
            }
            other => panic!("expected parts, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_text_with_image_drops_text_block() {
        let msg = Normalizer::new(1024).normalize(&stored(MessageRole::User, Some("   "), Some(&[9])));
        match msg.content {
            MessageContent::Parts(parts) => assert_eq!(parts.len(), 1),
            other => panic!("expected parts, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_image_is_replaced() {
        let msg = Normalizer::new(2).normalize(&stored(MessageRole::User, None, Some(&[1, 2, 3])));
        assert_eq!(
            msg.content,
            MessageContent::Parts(vec![ContentPart::Text {
                text: IMAGE_OMITTED.to_string()
            }])
        );
    }

    #[test]
    fn test_assistant_role_is_kept() {
        let msg = Normalizer::new(1024).normalize(&stored(MessageRole::Assistant, Some("Hi!"), None));
        assert_eq!(msg.role, ChatRole::Assistant);
    }
}

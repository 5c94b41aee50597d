#![allow(dead_code)]

pub mod mocks;

use futures::StreamExt;
use mnemo::chat::{ChatService, TurnRequest, TurnStream, UploadLimits};
use mnemo::db::{ChatStore, TursoClient};
use mnemo::memory::MemoryPolicy;
use mnemo::types::AppError;
use mocks::ScriptedLLMClient;
use std::sync::Arc;

pub const USER: &str = "alice";

pub async fn memory_store() -> Arc<dyn ChatStore> {
    Arc::new(
        TursoClient::new_memory()
            .await
            .expect("Failed to create in-memory database"),
    )
}

pub fn service(store: Arc<dyn ChatStore>, llm: Arc<ScriptedLLMClient>) -> ChatService {
    ChatService::new(store, llm, MemoryPolicy::default(), UploadLimits::default())
}

pub fn text_turn(session_id: &str, text: &str) -> TurnRequest {
    TurnRequest {
        session_id: session_id.to_string(),
        text: Some(text.to_string()),
        ..TurnRequest::default()
    }
}

/// Drain a turn stream, returning the emitted text and the first error.
pub async fn drain(mut stream: TurnStream) -> (String, Option<AppError>) {
    let mut text = String::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => text.push_str(&fragment),
            Err(e) => return (text, Some(e)),
        }
    }
    (text, None)
}

/// Submit a text turn and drain it, panicking on any error.
pub async fn run_turn(chat: &ChatService, session_id: &str, text: &str) -> String {
    let stream = chat
        .submit_turn(USER, text_turn(session_id, text))
        .await
        .expect("turn rejected");
    let (reply, err) = drain(stream).await;
    assert!(err.is_none(), "turn failed: {:?}", err);
    reply
}

//! Mock implementations for testing.
//!
//! [`ScriptedLLMClient`] plays back one scripted completion per chat request
//! and answers summarizer requests separately, so tests can count summary
//! refreshes independently of turns. [`FailingStore`] wraps a real store and
//! injects persistence failures.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mnemo::db::ChatStore;
use mnemo::llm::{ChatMessage, ChatModel, CompletionStream, LLMClient, StreamChunk};
use mnemo::memory::summarizer::SUMMARIZER_SYSTEM_PROMPT;
use mnemo::types::{
    AppError, ChatSession, MessageRole, ModelUsage, NewMessage, Result, StoredMessage, TokenUsage,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One scripted completion.
#[derive(Debug, Clone)]
pub enum Script {
    /// Emit the fragments, then the usage record
    Reply {
        fragments: Vec<String>,
        usage: TokenUsage,
    },
    /// Emit the fragments, then fail
    FailMidStream { fragments: Vec<String>, error: String },
    /// Fail before streaming starts
    FailToStart(String),
    /// Emit the fragments, then never finish
    Hang { fragments: Vec<String> },
}

impl Script {
    pub fn reply(fragments: &[&str], usage: TokenUsage) -> Self {
        Script::Reply {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            usage,
        }
    }

    pub fn fail_mid_stream(fragments: &[&str], error: &str) -> Self {
        Script::FailMidStream {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            error: error.to_string(),
        }
    }

    pub fn hang(fragments: &[&str]) -> Self {
        Script::Hang {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
        }
    }
}

pub const DEFAULT_REPLY: [&str; 2] = ["Hello", " there!"];
pub const SUMMARY_REPLY: &str = "User is planning a trip to Japan.";

pub fn default_usage() -> TokenUsage {
    TokenUsage::new(10, 5)
}

/// A recorded chat request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<ChatMessage>,
    pub model: ChatModel,
}

#[derive(Default)]
pub struct ScriptedLLMClient {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<RecordedRequest>>,
    summary_requests: Mutex<Vec<Vec<ChatMessage>>>,
    summary_reply: Mutex<Option<String>>,
    summary_usage: Mutex<TokenUsage>,
    summary_fails: AtomicBool,
}

impl ScriptedLLMClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue scripts; once exhausted every request gets [`DEFAULT_REPLY`].
    pub fn with_scripts(scripts: Vec<Script>) -> Self {
        let client = Self::default();
        client.scripts.lock().extend(scripts);
        client
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().push_back(script);
    }

    pub fn set_summary_reply(&self, reply: &str, usage: TokenUsage) {
        *self.summary_reply.lock() = Some(reply.to_string());
        *self.summary_usage.lock() = usage;
    }

    pub fn fail_summaries(&self, fail: bool) {
        self.summary_fails.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }

    pub fn summary_requests(&self) -> Vec<Vec<ChatMessage>> {
        self.summary_requests.lock().clone()
    }

    fn chunks(fragments: Vec<String>) -> Vec<Result<StreamChunk>> {
        fragments
            .into_iter()
            .map(|f| Ok(StreamChunk::Delta(f)))
            .collect()
    }
}

#[async_trait]
impl LLMClient for ScriptedLLMClient {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        model: ChatModel,
    ) -> Result<CompletionStream> {
        let is_summary = messages
            .first()
            .is_some_and(|m| m.text() == SUMMARIZER_SYSTEM_PROMPT);

        if is_summary {
            self.summary_requests.lock().push(messages.to_vec());
            if self.summary_fails.load(Ordering::SeqCst) {
                return Err(AppError::LLM("Mock summarizer failure".to_string()));
            }
            let reply = self
                .summary_reply
                .lock()
                .clone()
                .unwrap_or_else(|| SUMMARY_REPLY.to_string());
            let mut items = vec![Ok(StreamChunk::Delta(reply))];
            let usage = *self.summary_usage.lock();
            if !usage.is_empty() {
                items.push(Ok(StreamChunk::Usage(usage)));
            }
            return Ok(stream::iter(items).boxed());
        }

        self.requests.lock().push(RecordedRequest {
            messages: messages.to_vec(),
            model,
        });

        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Script::reply(&DEFAULT_REPLY, default_usage()));

        match script {
            Script::Reply { fragments, usage } => {
                let mut items = Self::chunks(fragments);
                items.push(Ok(StreamChunk::Usage(usage)));
                Ok(stream::iter(items).boxed())
            }
            Script::FailMidStream { fragments, error } => {
                let mut items = Self::chunks(fragments);
                items.push(Err(AppError::LLM(error)));
                Ok(stream::iter(items).boxed())
            }
            Script::FailToStart(error) => Err(AppError::LLM(error)),
            Script::Hang { fragments } => Ok(stream::iter(Self::chunks(fragments))
                .chain(stream::pending())
                .boxed()),
        }
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

/// Store wrapper that can fail selected writes.
pub struct FailingStore {
    inner: Arc<dyn ChatStore>,
    pub fail_assistant_append: AtomicBool,
    pub fail_usage: AtomicBool,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn ChatStore>) -> Self {
        Self {
            inner,
            fail_assistant_append: AtomicBool::new(false),
            fail_usage: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ChatStore for FailingStore {
    async fn ensure_user(&self, user_id: &str) -> Result<()> {
        self.inner.ensure_user(user_id).await
    }

    async fn create_session(&self, user_id: &str, title: Option<&str>) -> Result<ChatSession> {
        self.inner.create_session(user_id, title).await
    }

    async fn get_session(&self, user_id: &str, session_id: &str) -> Result<Option<ChatSession>> {
        self.inner.get_session(user_id, session_id).await
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>> {
        self.inner.list_sessions(user_id).await
    }

    async fn touch_session(
        &self,
        user_id: &str,
        session_id: &str,
        title_if_default: Option<&str>,
    ) -> Result<Option<ChatSession>> {
        self.inner
            .touch_session(user_id, session_id, title_if_default)
            .await
    }

    async fn update_session_title(
        &self,
        user_id: &str,
        session_id: &str,
        title: &str,
    ) -> Result<Option<ChatSession>> {
        self.inner
            .update_session_title(user_id, session_id, title)
            .await
    }

    async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<bool> {
        self.inner.delete_session(user_id, session_id).await
    }

    async fn append_message(
        &self,
        user_id: &str,
        session_id: &str,
        message: NewMessage,
    ) -> Result<StoredMessage> {
        if message.role == MessageRole::Assistant
            && self.fail_assistant_append.load(Ordering::SeqCst)
        {
            return Err(AppError::Database("Injected write failure".to_string()));
        }
        self.inner.append_message(user_id, session_id, message).await
    }

    async fn recent_messages(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        self.inner.recent_messages(user_id, session_id, limit).await
    }

    async fn all_messages(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        self.inner.all_messages(user_id, session_id, limit).await
    }

    async fn count_assistant_messages(&self, user_id: &str, session_id: &str) -> Result<u64> {
        self.inner.count_assistant_messages(user_id, session_id).await
    }

    async fn get_summary(&self, user_id: &str, session_id: &str) -> Result<String> {
        self.inner.get_summary(user_id, session_id).await
    }

    async fn set_summary(&self, user_id: &str, session_id: &str, summary: &str) -> Result<()> {
        self.inner.set_summary(user_id, session_id, summary).await
    }

    async fn add_token_usage(&self, user_id: &str, model: &str, usage: TokenUsage) -> Result<()> {
        if self.fail_usage.load(Ordering::SeqCst) {
            return Err(AppError::Database("Injected usage failure".to_string()));
        }
        self.inner.add_token_usage(user_id, model, usage).await
    }

    async fn get_token_usage(&self, user_id: &str) -> Result<Vec<ModelUsage>> {
        self.inner.get_token_usage(user_id).await
    }
}

//! Turn submission and title generation.
//!
//! [`ChatService`] is what the transport calls. It validates a turn, persists
//! the user message, assembles context and hands back a lazy stream of text
//! fragments; the [`TurnGuard`] inside that stream commits the assistant side.

pub mod validation;

pub use validation::{decode_attachment, UploadLimits};

use crate::db::ChatStore;
use crate::llm::{ChatMessage, ChatModel, LLMClient, StreamChunk};
use crate::memory::finalizer::TurnKind;
use crate::memory::{
    assemble_context, MemoryPolicy, Normalizer, PendingTurn, SessionLocks, Summarizer, TurnGuard,
    IMAGE_TITLE_PLACEHOLDER,
};
use crate::types::{AppError, Attachment, ChatSession, NewMessage, Result};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const TITLE_SYSTEM_PROMPT: &str = "Write a short, descriptive title of at most six words \
for a conversation that starts with the following message. Reply with the title only, without \
quotes or punctuation at the end.";

/// Text fragments of one generation, in emission order.
pub type TurnStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A new turn as received from the transport.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub session_id: String,
    pub text: Option<String>,
    pub attachment: Option<Attachment>,
    pub model: Option<String>,
}

#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    llm: Arc<dyn LLMClient>,
    summarizer: Arc<Summarizer>,
    locks: Arc<SessionLocks>,
    policy: MemoryPolicy,
    limits: Arc<UploadLimits>,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        llm: Arc<dyn LLMClient>,
        policy: MemoryPolicy,
        limits: UploadLimits,
    ) -> Self {
        let summarizer = Arc::new(Summarizer::new(
            llm.clone(),
            ChatModel::default(),
            policy.summary_max_chars,
        ));

        Self {
            store,
            llm,
            summarizer,
            locks: Arc::new(SessionLocks::new()),
            policy,
            limits: Arc::new(limits),
        }
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    pub fn policy(&self) -> MemoryPolicy {
        self.policy
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    fn validate(&self, request: &TurnRequest) -> Result<()> {
        if request.session_id.trim().is_empty() {
            return Err(AppError::InvalidInput("session_id is required".to_string()));
        }

        let has_text = request
            .text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        match &request.attachment {
            Some(attachment) => self.limits.check(attachment),
            None if has_text => Ok(()),
            None => Err(AppError::InvalidInput(
                "Message text or an image is required".to_string(),
            )),
        }
    }

    async fn owned_session(&self, user_id: &str, session_id: &str) -> Result<ChatSession> {
        self.store
            .get_session(user_id, session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))
    }

    fn pending(
        &self,
        user_id: &str,
        session_id: &str,
        model: ChatModel,
        kind: TurnKind,
        lock: Option<tokio::sync::OwnedMutexGuard<()>>,
    ) -> PendingTurn {
        PendingTurn::new(
            self.store.clone(),
            self.summarizer.clone(),
            self.policy,
            user_id,
            session_id,
            model,
            kind,
            lock,
        )
    }

    /// Submit a user turn and stream the assistant reply.
    ///
    /// Validation and ownership are checked before anything is written. The
    /// user message is persisted before the provider is called. The returned
    /// stream commits the reply when drained, and still commits whatever was
    /// produced if it is dropped early or the provider fails mid-stream.
    pub async fn submit_turn(&self, user_id: &str, request: TurnRequest) -> Result<TurnStream> {
        self.validate(&request)?;
        let session = self.owned_session(user_id, &request.session_id).await?;
        let model = ChatModel::resolve(request.model.as_deref());

        let lock = self.locks.acquire(&session.id).await;

        let text = request
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let title_seed = text
            .clone()
            .unwrap_or_else(|| IMAGE_TITLE_PLACEHOLDER.to_string());

        self.store
            .append_message(
                user_id,
                &session.id,
                NewMessage::user(text, request.attachment),
            )
            .await?;

        let summary = self.store.get_summary(user_id, &session.id).await?;
        let window = self
            .store
            .recent_messages(user_id, &session.id, self.policy.history_window)
            .await?;
        let context = assemble_context(
            &summary,
            &window,
            &Normalizer::new(self.limits.max_image_bytes),
        );

        let guard = TurnGuard::new(self.pending(
            user_id,
            &session.id,
            model,
            TurnKind::Reply { title_seed },
            Some(lock),
        ));

        info!(session_id = %session.id, model = %model, window = window.len(), "Starting turn");
        let upstream = self.llm.stream_chat(&context, model).await?;

        Ok(drive(guard, upstream, session.id))
    }

    /// Stream a generated title for a session and store it once the stream completes.
    pub async fn generate_title(
        &self,
        user_id: &str,
        session_id: &str,
        seed: &str,
        model: Option<&str>,
    ) -> Result<TurnStream> {
        let seed = seed.trim();
        if seed.is_empty() {
            return Err(AppError::InvalidInput("prompt is required".to_string()));
        }
        let session = self.owned_session(user_id, session_id).await?;
        let model = ChatModel::resolve(model);

        let messages = vec![
            ChatMessage::system(TITLE_SYSTEM_PROMPT),
            ChatMessage::user(seed),
        ];

        let guard = TurnGuard::new(self.pending(user_id, &session.id, model, TurnKind::Title, None));
        let upstream = self.llm.stream_chat(&messages, model).await?;

        Ok(drive(guard, upstream, session.id))
    }
}

/// Forward deltas to the caller while accumulating them, then commit.
///
/// A fragment is pushed into the guard before it is yielded, so a consumer
/// that stops after receiving it still gets it persisted.
fn drive(
    mut guard: TurnGuard,
    mut upstream: crate::llm::CompletionStream,
    session_id: String,
) -> TurnStream {
    Box::pin(async_stream::stream! {
        let mut failure = None;

        while let Some(item) = upstream.next().await {
            match item {
                Ok(StreamChunk::Delta(text)) => {
                    guard.push(&text);
                    yield Ok(text);
                }
                Ok(StreamChunk::Usage(usage)) => guard.record_usage(usage),
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Provider stream failed");
                    failure = Some(e);
                    break;
                }
            }
        }
        drop(upstream);

        let committed = if failure.is_some() {
            guard.finalize_interrupted().await
        } else {
            guard.finalize().await
        };

        if let Err(e) = committed {
            error!(session_id = %session_id, error = %e, "Failed to finalize turn");
            yield Err(e);
        }
        if let Some(e) = failure {
            yield Err(e);
        }
    })
}

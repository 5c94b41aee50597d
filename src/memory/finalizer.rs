//! Commit protocol for a streamed turn.
//!
//! A [`TurnGuard`] owns everything the turn has to persist once the stream
//! ends: the accumulated text, the usage record and the session lock. The
//! commit runs exactly once, either through [`TurnGuard::finalize`] when the
//! stream is drained or from `Drop` when the consumer goes away early.

use crate::db::ChatStore;
use crate::llm::ChatModel;
use crate::memory::summarizer::{render_window, Summarizer};
use crate::memory::MemoryPolicy;
use crate::types::{clamp_title, AppError, NewMessage, Result, TokenUsage};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};

/// What the finished stream is committed as.
#[derive(Debug, Clone)]
pub enum TurnKind {
    /// Assistant reply; `title_seed` replaces the title while it is still the default.
    Reply { title_seed: String },
    /// Generated session title, applied only when the stream completed.
    Title,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutcome {
    pub assistant_message_id: Option<String>,
    pub summarized: bool,
    pub title: Option<String>,
}

/// State of a turn that has not been committed yet.
pub struct PendingTurn {
    store: Arc<dyn ChatStore>,
    summarizer: Arc<Summarizer>,
    policy: MemoryPolicy,
    user_id: String,
    session_id: String,
    model: ChatModel,
    kind: TurnKind,
    buffer: String,
    usage: TokenUsage,
    _lock: Option<OwnedMutexGuard<()>>,
}

impl PendingTurn {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ChatStore>,
        summarizer: Arc<Summarizer>,
        policy: MemoryPolicy,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        model: ChatModel,
        kind: TurnKind,
        lock: Option<OwnedMutexGuard<()>>,
    ) -> Self {
        Self {
            store,
            summarizer,
            policy,
            user_id: user_id.into(),
            session_id: session_id.into(),
            model,
            kind,
            buffer: String::new(),
            usage: TokenUsage::default(),
            _lock: lock,
        }
    }

    fn has_work(&self) -> bool {
        !self.buffer.trim().is_empty() || !self.usage.is_empty()
    }

    async fn commit(self, completed: bool) -> Result<TurnOutcome> {
        let mut outcome = TurnOutcome::default();

        match &self.kind {
            TurnKind::Reply { title_seed } => {
                if !self.buffer.trim().is_empty() {
                    let stored = self
                        .store
                        .append_message(
                            &self.user_id,
                            &self.session_id,
                            NewMessage::assistant(self.buffer.clone()),
                        )
                        .await?;
                    outcome.assistant_message_id = Some(stored.id);

                    self.store
                        .touch_session(&self.user_id, &self.session_id, Some(title_seed))
                        .await?;

                    let count = self
                        .store
                        .count_assistant_messages(&self.user_id, &self.session_id)
                        .await?;
                    if self.policy.should_summarize(count) {
                        outcome.summarized = self.refresh_summary().await?;
                    }
                }
            }
            TurnKind::Title => {
                let title = clean_title(&self.buffer);
                if completed && !title.is_empty() {
                    if self
                        .store
                        .update_session_title(&self.user_id, &self.session_id, &title)
                        .await?
                        .is_some()
                    {
                        outcome.title = Some(title);
                    }
                }
            }
        }

        if !self.usage.is_empty() {
            self.store
                .add_token_usage(&self.user_id, self.model.as_str(), self.usage)
                .await?;
        }

        debug!(
            session_id = %self.session_id,
            completed,
            summarized = outcome.summarized,
            "Turn committed"
        );

        Ok(outcome)
    }

    /// Returns whether a new summary was stored.
    async fn refresh_summary(&self) -> Result<bool> {
        let previous = self
            .store
            .get_summary(&self.user_id, &self.session_id)
            .await?;
        let window = self
            .store
            .recent_messages(&self.user_id, &self.session_id, self.policy.history_window)
            .await?;

        let update = match self
            .summarizer
            .summarize(&previous, &render_window(&window))
            .await
        {
            Ok(update) => update,
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Summary refresh failed, keeping previous summary");
                return Ok(false);
            }
        };

        if !update.usage.is_empty() {
            self.store
                .add_token_usage(&self.user_id, self.summarizer.model().as_str(), update.usage)
                .await?;
        }

        if update.summary.is_empty() {
            warn!(session_id = %self.session_id, "Summarizer returned nothing, keeping previous summary");
            return Ok(false);
        }

        self.store
            .set_summary(&self.user_id, &self.session_id, &update.summary)
            .await?;
        info!(session_id = %self.session_id, "Rolling summary updated");

        Ok(true)
    }
}

/// Strip wrapping quotes and whitespace from a generated title and cap its length.
pub fn clean_title(raw: &str) -> String {
    let quotes: &[char] = &['"', '\'', '`', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}'];
    let title = raw.trim().trim_matches(quotes).trim();
    clamp_title(title).trim_end().to_string()
}

/// Accumulates a streamed turn and commits it exactly once.
pub struct TurnGuard {
    state: Option<PendingTurn>,
}

impl TurnGuard {
    pub fn new(pending: PendingTurn) -> Self {
        Self {
            state: Some(pending),
        }
    }

    pub fn push(&mut self, fragment: &str) {
        if let Some(state) = self.state.as_mut() {
            state.buffer.push_str(fragment);
        }
    }

    pub fn record_usage(&mut self, usage: TokenUsage) {
        if let Some(state) = self.state.as_mut() {
            state.usage = usage;
        }
    }

    pub fn text(&self) -> &str {
        self.state.as_ref().map(|s| s.buffer.as_str()).unwrap_or("")
    }

    /// Commit after the stream was fully drained.
    pub async fn finalize(self) -> Result<TurnOutcome> {
        self.commit_now(true).await
    }

    /// Commit after the provider failed mid-stream. Replies keep their partial
    /// text; titles are not applied.
    pub async fn finalize_interrupted(self) -> Result<TurnOutcome> {
        self.commit_now(false).await
    }

    async fn commit_now(mut self, completed: bool) -> Result<TurnOutcome> {
        let pending = self
            .state
            .take()
            .ok_or_else(|| AppError::Internal("Turn already finalized".to_string()))?;

        // The commit runs on its own task so it survives the caller being dropped mid-await.
        tokio::spawn(pending.commit(completed))
            .await
            .map_err(|e| AppError::Internal(format!("Turn commit task failed: {}", e)))?
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        let Some(pending) = self.state.take() else {
            return;
        };
        if !pending.has_work() {
            return;
        }

        let session_id = pending.session_id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = pending.commit(false).await {
                        error!(session_id = %session_id, error = %e, "Failed to commit interrupted turn");
                    }
                });
            }
            Err(_) => {
                error!(session_id = %session_id, "No runtime available, interrupted turn was not committed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_title_strips_quotes() {
        assert_eq!(clean_title("  \"Trip to Japan\"\n"), "Trip to Japan");
        assert_eq!(clean_title("\u{201c}Budget plan\u{201d}"), "Budget plan");
        assert_eq!(clean_title("'  '"), "");
    }

    #[test]
    fn test_clean_title_caps_length() {
        let long = "word ".repeat(40);
        assert!(clean_title(&long).chars().count() <= crate::types::TITLE_MAX_CHARS);
    }
}

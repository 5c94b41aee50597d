//! Conversation memory: windowed context, rolling summaries and turn finalization.
//!
//! The only long-term memory is a bounded text summary that is refreshed every
//! [`SUMMARY_UPDATE_EVERY`] assistant messages; everything else the model sees
//! is the last [`HISTORY_WINDOW`] messages, sent verbatim.
//!
//! - [`context_manager`] - builds the provider request from summary + window
//! - [`normalize`] - maps stored messages (text and/or image) to provider content
//! - [`summarizer`] - renders the window as text and asks the model for a new summary
//! - [`finalizer`] - the commit-exactly-once guard for a streamed turn
//! - [`locks`] - per-session serialization of turns

pub mod context_manager;
pub mod finalizer;
pub mod locks;
pub mod normalize;
pub mod summarizer;

pub use context_manager::assemble_context;
pub use finalizer::{PendingTurn, TurnGuard, TurnOutcome};
pub use locks::SessionLocks;
pub use normalize::Normalizer;
pub use summarizer::Summarizer;

/// Number of most recent messages sent verbatim with every turn.
pub const HISTORY_WINDOW: usize = 8;

/// A summary refresh runs on every N-th assistant message of a session.
pub const SUMMARY_UPDATE_EVERY: u64 = 8;

/// Soft bound on the stored summary, in characters.
pub const SUMMARY_MAX_CHARS: usize = 2000;

pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Stand-in for an image when a message has to be rendered as plain text.
pub const IMAGE_PLACEHOLDER: &str = "[image]";

/// Title seed used when the first turn of a session carried only an image.
pub const IMAGE_TITLE_PLACEHOLDER: &str = "Image message";

/// Tunables for windowing and summarization, read from `[memory]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryPolicy {
    pub history_window: usize,
    pub summary_update_every: u64,
    pub summary_max_chars: usize,
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        Self {
            history_window: HISTORY_WINDOW,
            summary_update_every: SUMMARY_UPDATE_EVERY,
            summary_max_chars: SUMMARY_MAX_CHARS,
        }
    }
}

impl MemoryPolicy {
    /// Whether the assistant message that brought the count to `assistant_count`
    /// should trigger a summary refresh.
    pub fn should_summarize(&self, assistant_count: u64) -> bool {
        self.summary_update_every > 0
            && assistant_count > 0
            && assistant_count % self.summary_update_every == 0
    }
}

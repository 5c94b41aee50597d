//! Relational storage for sessions, messages, rolling summaries and token usage.
//!
//! - [`traits::ChatStore`]: the storage seam the chat pipeline talks to
//! - [`turso::TursoClient`]: libsql implementation (in-memory, local file or remote Turso)

pub mod traits;
pub mod turso;

pub use traits::{ChatStore, DatabaseProvider};
pub use turso::TursoClient;

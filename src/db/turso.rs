use crate::db::traits::ChatStore;
use crate::types::{
    clamp_title, AppError, Attachment, ChatSession, MessageRole, ModelUsage, NewMessage, Result,
    StoredMessage, TokenUsage, DEFAULT_SESSION_TITLE,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection, Database, Row, TransactionBehavior, Value};
use std::ops::Deref;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS chat_sessions (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_chat_sessions_user ON chat_sessions(user_id, updated_at)",
    // seq gives a strict insertion order even when created_at collides
    "CREATE TABLE IF NOT EXISTS chat_messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        session_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        role TEXT NOT NULL,
        content TEXT,
        image_bytes BLOB,
        image_mime TEXT,
        created_at INTEGER NOT NULL,
        FOREIGN KEY (session_id) REFERENCES chat_sessions(id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages(session_id, seq)",
    "CREATE TABLE IF NOT EXISTS chat_summaries (
        session_id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        summary TEXT NOT NULL DEFAULT '',
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS token_usage (
        user_id TEXT NOT NULL,
        model TEXT NOT NULL,
        prompt_tokens INTEGER NOT NULL DEFAULT 0,
        completion_tokens INTEGER NOT NULL DEFAULT 0,
        total_tokens INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (user_id, model)
    )",
];

const MESSAGE_COLUMNS: &str = "id, session_id, role, content, image_bytes, image_mime, created_at";
const SESSION_COLUMNS: &str = "id, user_id, title, created_at, updated_at";

/// How long a file connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TursoClient {
    db: Database,
    /// In-memory databases live and die with a single connection, so it is kept and shared.
    shared: Option<Connection>,
    /// Held for the whole of each operation on the shared connection so an open
    /// transaction never absorbs or collides with statements from another caller.
    shared_lock: Mutex<()>,
    local: bool,
}

/// A connection checked out for one store operation.
struct Conn<'a> {
    conn: Connection,
    _guard: Option<MutexGuard<'a, ()>>,
}

impl Deref for Conn<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl TursoClient {
    fn from_database(db: Database, shared: Option<Connection>, local: bool) -> Self {
        Self {
            db,
            shared,
            shared_lock: Mutex::new(()),
            local,
        }
    }

    pub async fn new_remote(url: String, auth_token: String) -> Result<Self> {
        let db = Builder::new_remote(url, auth_token)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Turso: {}", e)))?;

        let client = Self::from_database(db, None, false);
        client.initialize_schema().await?;

        Ok(client)
    }

    pub async fn new_local(path: &str) -> Result<Self> {
        if path == ":memory:" {
            return Self::new_memory().await;
        }

        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Database(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database: {}", e)))?;

        let client = Self::from_database(db, None, true);
        client.enable_wal().await?;
        client.initialize_schema().await?;

        Ok(client)
    }

    pub async fn new_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database: {}", e)))?;
        let conn = db
            .connect()
            .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))?;

        let client = Self::from_database(db, Some(conn), true);
        client.initialize_schema().await?;

        Ok(client)
    }

    /// A raw connection. Local file connections wait out writer locks instead of
    /// failing with `database is locked`.
    pub fn connection(&self) -> Result<Connection> {
        if let Some(conn) = &self.shared {
            return Ok(conn.clone());
        }

        let conn = self
            .db
            .connect()
            .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))?;

        if self.local {
            conn.busy_timeout(BUSY_TIMEOUT)
                .map_err(|e| AppError::Database(format!("Failed to set busy timeout: {}", e)))?;
        }

        Ok(conn)
    }

    /// Checks out a connection for one operation, serializing access when the
    /// connection is shared. Must not be held across another store call.
    async fn conn(&self) -> Result<Conn<'_>> {
        let guard = match self.shared {
            Some(_) => Some(self.shared_lock.lock().await),
            None => None,
        };

        Ok(Conn {
            conn: self.connection()?,
            _guard: guard,
        })
    }

    /// Lets readers proceed while a turn is being written.
    async fn enable_wal(&self) -> Result<()> {
        let conn = self.conn().await?;

        let mut rows = conn
            .query("PRAGMA journal_mode=WAL", ())
            .await
            .map_err(|e| AppError::Database(format!("Failed to enable WAL: {}", e)))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            let mode = text_column(&row, 0)?;
            tracing::debug!(journal_mode = %mode, "Journal mode set");
        }

        Ok(())
    }

    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn().await?;

        for statement in SCHEMA {
            conn.execute(statement, ())
                .await
                .map_err(|e| AppError::Database(format!("Failed to initialize schema: {}", e)))?;
        }

        Ok(())
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn timestamp(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::Database(format!("Invalid timestamp in database: {}", millis)))
}

fn text_column(row: &Row, idx: i32) -> Result<String> {
    row.get::<String>(idx)
        .map_err(|e| AppError::Database(e.to_string()))
}

fn int_column(row: &Row, idx: i32) -> Result<i64> {
    row.get::<i64>(idx)
        .map_err(|e| AppError::Database(e.to_string()))
}

fn nullable_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row
        .get_value(idx)
        .map_err(|e| AppError::Database(e.to_string()))?
    {
        Value::Text(text) => Ok(Some(text)),
        Value::Null => Ok(None),
        other => Err(AppError::Database(format!(
            "Expected text in column {}, found {:?}",
            idx, other
        ))),
    }
}

fn nullable_blob(row: &Row, idx: i32) -> Result<Option<Vec<u8>>> {
    match row
        .get_value(idx)
        .map_err(|e| AppError::Database(e.to_string()))?
    {
        Value::Blob(bytes) => Ok(Some(bytes)),
        Value::Null => Ok(None),
        _ => Err(AppError::Database(format!(
            "Expected blob in column {}",
            idx
        ))),
    }
}

fn row_to_session(row: &Row) -> Result<ChatSession> {
    Ok(ChatSession {
        id: text_column(row, 0)?,
        user_id: text_column(row, 1)?,
        title: text_column(row, 2)?,
        created_at: timestamp(int_column(row, 3)?)?,
        updated_at: timestamp(int_column(row, 4)?)?,
    })
}

fn row_to_message(row: &Row) -> Result<StoredMessage> {
    let role_str = text_column(row, 2)?;
    let role = MessageRole::parse(&role_str)
        .ok_or_else(|| AppError::Database(format!("Unknown message role: {}", role_str)))?;

    let attachment = match (nullable_blob(row, 4)?, nullable_text(row, 5)?) {
        (Some(bytes), Some(mime)) => Some(Attachment { bytes, mime }),
        (Some(bytes), None) => Some(Attachment {
            bytes,
            mime: "application/octet-stream".to_string(),
        }),
        _ => None,
    };

    Ok(StoredMessage {
        id: text_column(row, 0)?,
        session_id: text_column(row, 1)?,
        role,
        text: nullable_text(row, 3)?,
        attachment,
        created_at: timestamp(int_column(row, 6)?)?,
    })
}

impl TursoClient {
    async fn query_messages(
        &self,
        sql: &str,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let conn = self.conn().await?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut rows = conn
            .query(sql, (user_id, session_id, limit))
            .await
            .map_err(|e| AppError::Database(format!("Failed to query messages: {}", e)))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            messages.push(row_to_message(&row)?);
        }

        Ok(messages)
    }
}

#[async_trait]
impl ChatStore for TursoClient {
    async fn ensure_user(&self, user_id: &str) -> Result<()> {
        let conn = self.conn().await?;

        conn.execute(
            "INSERT OR IGNORE INTO users (id, created_at) VALUES (?, ?)",
            (user_id, now_millis()),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to ensure user: {}", e)))?;

        Ok(())
    }

    async fn create_session(&self, user_id: &str, title: Option<&str>) -> Result<ChatSession> {
        self.ensure_user(user_id).await?;

        let conn = self.conn().await?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_millis();
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(clamp_title)
            .unwrap_or_else(|| DEFAULT_SESSION_TITLE.to_string());

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|e| AppError::Database(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "INSERT INTO chat_sessions (id, user_id, title, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            (id.as_str(), user_id, title.as_str(), now, now),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create session: {}", e)))?;

        tx.execute(
            "INSERT INTO chat_summaries (session_id, user_id, summary, updated_at)
             VALUES (?, ?, '', ?)",
            (id.as_str(), user_id, now),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to create summary: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit session: {}", e)))?;

        Ok(ChatSession {
            id,
            user_id: user_id.to_string(),
            title,
            created_at: timestamp(now)?,
            updated_at: timestamp(now)?,
        })
    }

    async fn get_session(&self, user_id: &str, session_id: &str) -> Result<Option<ChatSession>> {
        let conn = self.conn().await?;

        let mut rows = conn
            .query(
                &format!(
                    "SELECT {} FROM chat_sessions WHERE user_id = ? AND id = ?",
                    SESSION_COLUMNS
                ),
                (user_id, session_id),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query session: {}", e)))?;

        match rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            Some(row) => Ok(Some(row_to_session(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>> {
        let conn = self.conn().await?;

        let mut rows = conn
            .query(
                &format!(
                    "SELECT {} FROM chat_sessions WHERE user_id = ?
                     ORDER BY updated_at DESC, created_at DESC",
                    SESSION_COLUMNS
                ),
                [user_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query sessions: {}", e)))?;

        let mut sessions = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            sessions.push(row_to_session(&row)?);
        }

        Ok(sessions)
    }

    async fn touch_session(
        &self,
        user_id: &str,
        session_id: &str,
        title_if_default: Option<&str>,
    ) -> Result<Option<ChatSession>> {
        let conn = self.conn().await?;
        // Binding the default title as the replacement turns the CASE into a no-op.
        let replacement = title_if_default
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(clamp_title)
            .unwrap_or_else(|| DEFAULT_SESSION_TITLE.to_string());

        conn.execute(
            "UPDATE chat_sessions
             SET updated_at = ?1,
                 title = CASE WHEN title = ?2 THEN ?3 ELSE title END
             WHERE id = ?4 AND user_id = ?5",
            (
                now_millis(),
                DEFAULT_SESSION_TITLE,
                replacement.as_str(),
                session_id,
                user_id,
            ),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to touch session: {}", e)))?;
        drop(conn);

        self.get_session(user_id, session_id).await
    }

    async fn update_session_title(
        &self,
        user_id: &str,
        session_id: &str,
        title: &str,
    ) -> Result<Option<ChatSession>> {
        let sanitized = title.trim();
        if sanitized.is_empty() {
            return Ok(None);
        }

        let conn = self.conn().await?;
        let updated = conn
            .execute(
                "UPDATE chat_sessions SET title = ?, updated_at = ? WHERE id = ? AND user_id = ?",
                (
                    clamp_title(sanitized).as_str(),
                    now_millis(),
                    session_id,
                    user_id,
                ),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to update session title: {}", e)))?;

        drop(conn);

        if updated == 0 {
            return Ok(None);
        }

        self.get_session(user_id, session_id).await
    }

    async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<bool> {
        let conn = self.conn().await?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|e| AppError::Database(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM chat_messages WHERE user_id = ? AND session_id = ?",
            (user_id, session_id),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to delete messages: {}", e)))?;

        tx.execute(
            "DELETE FROM chat_summaries WHERE user_id = ? AND session_id = ?",
            (user_id, session_id),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to delete summary: {}", e)))?;

        let deleted = tx
            .execute(
                "DELETE FROM chat_sessions WHERE user_id = ? AND id = ?",
                (user_id, session_id),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete session: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit delete: {}", e)))?;

        Ok(deleted > 0)
    }

    async fn append_message(
        &self,
        user_id: &str,
        session_id: &str,
        message: NewMessage,
    ) -> Result<StoredMessage> {
        let conn = self.conn().await?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_millis();
        let (image_bytes, image_mime) = match &message.attachment {
            Some(att) => (Some(att.bytes.clone()), Some(att.mime.clone())),
            None => (None, None),
        };

        conn.execute(
            "INSERT INTO chat_messages
             (id, session_id, user_id, role, content, image_bytes, image_mime, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            (
                id.as_str(),
                session_id,
                user_id,
                message.role.as_str(),
                message.text.clone(),
                image_bytes,
                image_mime,
                now,
            ),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to add message: {}", e)))?;

        Ok(StoredMessage {
            id,
            session_id: session_id.to_string(),
            role: message.role,
            text: message.text,
            attachment: message.attachment,
            created_at: timestamp(now)?,
        })
    }

    async fn recent_messages(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let sql = format!(
            "SELECT {} FROM chat_messages WHERE user_id = ? AND session_id = ?
             ORDER BY seq DESC LIMIT ?",
            MESSAGE_COLUMNS
        );
        let mut messages = self
            .query_messages(&sql, user_id, session_id, limit)
            .await?;
        messages.reverse();
        Ok(messages)
    }

    async fn all_messages(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let sql = format!(
            "SELECT {} FROM chat_messages WHERE user_id = ? AND session_id = ?
             ORDER BY seq ASC LIMIT ?",
            MESSAGE_COLUMNS
        );
        self.query_messages(&sql, user_id, session_id, limit).await
    }

    async fn count_assistant_messages(&self, user_id: &str, session_id: &str) -> Result<u64> {
        let conn = self.conn().await?;

        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM chat_messages
                 WHERE user_id = ? AND session_id = ? AND role = 'assistant'",
                (user_id, session_id),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to count messages: {}", e)))?;

        match rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            Some(row) => Ok(to_u64(int_column(&row, 0)?)),
            None => Ok(0),
        }
    }

    async fn get_summary(&self, user_id: &str, session_id: &str) -> Result<String> {
        let conn = self.conn().await?;

        let mut rows = conn
            .query(
                "SELECT summary FROM chat_summaries WHERE user_id = ? AND session_id = ?",
                (user_id, session_id),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query summary: {}", e)))?;

        match rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            Some(row) => text_column(&row, 0),
            None => Ok(String::new()),
        }
    }

    async fn set_summary(&self, user_id: &str, session_id: &str, summary: &str) -> Result<()> {
        let conn = self.conn().await?;

        conn.execute(
            "INSERT INTO chat_summaries (session_id, user_id, summary, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                summary = excluded.summary,
                updated_at = excluded.updated_at",
            (session_id, user_id, summary, now_millis()),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to store summary: {}", e)))?;

        Ok(())
    }

    async fn add_token_usage(&self, user_id: &str, model: &str, usage: TokenUsage) -> Result<()> {
        let conn = self.conn().await?;

        conn.execute(
            "INSERT INTO token_usage
             (user_id, model, prompt_tokens, completion_tokens, total_tokens, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id, model) DO UPDATE SET
                prompt_tokens = prompt_tokens + excluded.prompt_tokens,
                completion_tokens = completion_tokens + excluded.completion_tokens,
                total_tokens = total_tokens + excluded.total_tokens,
                updated_at = excluded.updated_at",
            (
                user_id,
                model,
                to_i64(usage.prompt_tokens),
                to_i64(usage.completion_tokens),
                to_i64(usage.total_tokens),
                now_millis(),
            ),
        )
        .await
        .map_err(|e| AppError::Database(format!("Failed to record token usage: {}", e)))?;

        Ok(())
    }

    async fn get_token_usage(&self, user_id: &str) -> Result<Vec<ModelUsage>> {
        let conn = self.conn().await?;

        let mut rows = conn
            .query(
                "SELECT model, prompt_tokens, completion_tokens, total_tokens
                 FROM token_usage WHERE user_id = ? ORDER BY model",
                [user_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query token usage: {}", e)))?;

        let mut usage = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            usage.push(ModelUsage {
                model: text_column(&row, 0)?,
                prompt_tokens: to_u64(int_column(&row, 1)?),
                completion_tokens: to_u64(int_column(&row, 2)?),
                total_tokens: to_u64(int_column(&row, 3)?),
            });
        }

        Ok(usage)
    }
}

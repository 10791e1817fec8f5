//! SQLite conversation repository implementation.
//!
//! Implements `ConversationRepository` from `airi-core` using sqlx with
//! split read/write pools: raw queries, a private Row struct, writes on
//! the writer pool, reads on the reader pool.

use chrono::{DateTime, Utc};
use sqlx::Row;

use airi_core::chat::repository::ConversationRepository;
use airi_types::chat::StoredMessage;
use airi_types::error::RepositoryError;
use airi_types::llm::MessageRole;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain StoredMessage.
struct ConversationRow {
    user_id: String,
    session_id: Option<String>,
    role: String,
    message: String,
    created_at: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            session_id: row.try_get("session_id")?,
            role: row.try_get("role")?,
            message: row.try_get("message")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<StoredMessage, RepositoryError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let created_at = parse_datetime(&self.created_at)?;

        Ok(StoredMessage {
            user_id: self.user_id,
            session_id: self.session_id,
            role,
            message: self.message,
            created_at,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid timestamp '{s}': {e}")))
}

impl ConversationRepository for SqliteConversationRepository {
    async fn save_message(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        role: MessageRole,
        message: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO conversations (user_id, session_id, role, message, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(session_id)
        .bind(role.to_string())
        .bind(message)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn recent_messages(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT user_id, session_id, role, message, created_at \
             FROM conversations WHERE user_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                ConversationRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_message()
            })
            .collect()
    }
}

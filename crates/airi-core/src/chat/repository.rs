//! ConversationRepository trait definition.
//!
//! Append-only persistence for conversation rows, used by the service's
//! hybrid memory path. Implementations live in airi-infra (e.g.,
//! `SqliteConversationRepository`). Uses native async fn in traits
//! (RPITIT, Rust 2024 edition).

use airi_types::chat::StoredMessage;
use airi_types::error::RepositoryError;
use airi_types::llm::MessageRole;

/// Repository trait for the append-only conversation table.
pub trait ConversationRepository: Send + Sync {
    /// Append one message row. Rows are never updated or deleted.
    fn save_message(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        role: MessageRole,
        message: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Fetch the most recent `limit` rows for a user, newest first.
    fn recent_messages(
        &self,
        user_id: &str,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<StoredMessage>, RepositoryError>> + Send;
}

//! Conversation turn and stored-message types for Airi.
//!
//! A [`Turn`] is one completed user/assistant exchange. The history file on
//! disk is a JSON array of turns; the serialized field name for the
//! assistant side is `ai` to match the existing file format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::{Message, MessageRole};

/// One user input paired with the assistant's completed response.
///
/// Immutable once stored; created only when a full response completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    #[serde(rename = "ai")]
    pub assistant: String,
}

impl Turn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }

    /// Expand the turn into its user/assistant message pair, oldest first.
    pub fn messages(&self) -> [Message; 2] {
        [
            Message::user(self.user.clone()),
            Message::assistant(self.assistant.clone()),
        ]
    }
}

/// Flatten a slice of turns into an alternating message sequence.
pub fn turns_to_messages(turns: &[Turn]) -> Vec<Message> {
    turns.iter().flat_map(|t| t.messages()).collect()
}

/// One row of the append-only conversation table.
///
/// Rows are never updated; reads fetch the most recent N per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub user_id: String,
    pub session_id: Option<String>,
    pub role: MessageRole,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

//! SQLite persistence: connection pool and the conversation repository.

pub mod conversation;
pub mod pool;

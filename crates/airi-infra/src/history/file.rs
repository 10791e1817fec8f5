//! JSON history file store.
//!
//! The full turn history lives in one human-readable JSON file: an array
//! of `{"user": ..., "ai": ...}` objects, read once at startup and
//! rewritten wholesale on every save. A missing or corrupt file is an
//! empty history, never an error.

use std::path::PathBuf;

use tracing::warn;

use airi_core::history::store::HistoryStore;
use airi_types::chat::Turn;
use airi_types::error::HistoryError;

/// File-backed implementation of [`HistoryStore`].
pub struct JsonHistoryStore {
    path: PathBuf,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl HistoryStore for JsonHistoryStore {
    async fn load(&self) -> Vec<Turn> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Vec::new();
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "could not read history file, starting fresh");
                return Vec::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(turns) => turns,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "history file is malformed, starting fresh");
                Vec::new()
            }
        }
    }

    async fn save(&self, turns: &[Turn]) -> Result<(), HistoryError> {
        let json = serde_json::to_string_pretty(turns)
            .map_err(|e| HistoryError::Serialize(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HistoryError::Write(e.to_string()))?;
        }

        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| HistoryError::Write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(tmp.path().join("history.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_malformed_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("history.json");
        tokio::fs::write(&path, "{ not json ]").await.unwrap();

        let store = JsonHistoryStore::new(path);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(tmp.path().join("history.json"));

        let turns = vec![
            Turn::new("hello", "good evening, Master"),
            Turn::new("tea please", "*bows* right away"),
        ];
        store.save(&turns).await.unwrap();

        let loaded = store.load().await;
        assert_eq!(loaded, turns);
    }

    #[tokio::test]
    async fn test_save_overwrites_wholesale() {
        let tmp = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(tmp.path().join("history.json"));

        store.save(&[Turn::new("a", "b")]).await.unwrap();
        store.save(&[Turn::new("c", "d")]).await.unwrap();

        let loaded = store.load().await;
        assert_eq!(loaded, vec![Turn::new("c", "d")]);
    }

    #[tokio::test]
    async fn test_file_is_human_readable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("history.json");
        let store = JsonHistoryStore::new(&path);

        store.save(&[Turn::new("hello", "hi")]).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        // Pretty-printed with the `ai` wire field.
        assert!(content.contains("\n"));
        assert!(content.contains("\"ai\": \"hi\""));
    }
}

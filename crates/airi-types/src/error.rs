use thiserror::Error;

/// Errors from repository operations (used by trait definitions in airi-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,
}

/// Errors from the history file store.
///
/// Load failures are recovered by the store itself (missing or corrupt files
/// become an empty history); this type covers the save path.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to write history file: {0}")]
    Write(String),

    #[error("failed to serialize history: {0}")]
    Serialize(String),
}

/// Errors from the speech playback pipeline.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio tool '{0}' not found; is it installed and on PATH?")]
    ToolMissing(String),

    #[error("failed to start audio pipeline: {0}")]
    SpawnFailed(String),

    #[error("audio pipe closed: {0}")]
    PipeClosed(String),
}

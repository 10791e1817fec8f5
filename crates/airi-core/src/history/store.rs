//! HistoryStore trait definition.
//!
//! The history buffer is owned by whichever component persists it; the
//! engine only borrows a bounded view per call. Saves rewrite the whole
//! buffer; loads never fail (a missing or corrupt store yields an empty
//! history).

use airi_types::chat::Turn;
use airi_types::error::HistoryError;

/// Port for loading and saving the full turn history.
///
/// Implementations live in airi-infra (e.g., `JsonHistoryStore`).
pub trait HistoryStore: Send + Sync {
    /// Load the stored history. Missing or malformed data is recovered
    /// locally as an empty history; this never errors.
    fn load(&self) -> impl std::future::Future<Output = Vec<Turn>> + Send;

    /// Overwrite the stored history wholesale.
    fn save(
        &self,
        turns: &[Turn],
    ) -> impl std::future::Future<Output = Result<(), HistoryError>> + Send;
}

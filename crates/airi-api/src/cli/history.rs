//! History file listing.

use std::path::Path;

use console::style;

use airi_core::history::store::HistoryStore;
use airi_infra::history::file::JsonHistoryStore;
use airi_types::config::AppConfig;

/// Print the most recent turns from the history file.
pub async fn show_history(config: &AppConfig, data_dir: &Path, limit: usize) {
    let store = JsonHistoryStore::new(data_dir.join(&config.history.file));
    let history = store.load().await;

    if history.is_empty() {
        println!("\n  {}\n", style("No saved conversation yet.").dim());
        return;
    }

    let keep = history.len().saturating_sub(limit);
    println!();
    for turn in &history[keep..] {
        println!("  {} {}", style("You >").green().bold(), turn.user);
        println!("  {} {}", style(format!("{} >", config.persona.name)).cyan().bold(), turn.assistant);
        println!();
    }
}

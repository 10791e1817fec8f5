//! Local terminal chat loop.
//!
//! Brings up the llama-server backend, loads the history file, then loops:
//! read a line, assemble and prune the context, stream the reply to the
//! terminal fragment by fragment, seal the turn, rewrite the history file.
//! Farewell keywords get a generated in-character goodbye before exit.

use std::io::Write;
use std::path::Path;

use console::style;
use futures_util::StreamExt;
use tracing::warn;

use airi_core::chat::engine::ReplyEvent;
use airi_core::history::store::HistoryStore;
use airi_infra::history::file::JsonHistoryStore;
use airi_types::chat::{turns_to_messages, Turn};
use airi_types::config::AppConfig;

use crate::state::start_backend;

use super::input::{ChatInput, InputEvent};

/// Run the interactive chat loop against the local model.
pub async fn run_chat_loop(config: &AppConfig, data_dir: &Path) -> anyhow::Result<()> {
    let persona = config.persona.clone();

    let loading = indicatif::ProgressBar::new_spinner();
    loading.set_style(
        indicatif::ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .expect("static spinner template"),
    );
    loading.set_message("loading model...");
    loading.enable_steady_tick(std::time::Duration::from_millis(80));

    let backend = match start_backend(config).await {
        Ok(backend) => {
            loading.finish_and_clear();
            backend
        }
        Err(e) => {
            loading.finish_and_clear();
            return Err(e);
        }
    };
    let engine = backend.engine.clone();

    let store = JsonHistoryStore::new(data_dir.join(&config.history.file));
    let mut history = store.load().await;

    println!(
        "  {} is ready to serve you. (type 'exit' or 'quit' to leave)",
        style(&persona.name).cyan().bold()
    );

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut chat_input, _writer) =
        ChatInput::new(prompt).map_err(|e| anyhow::anyhow!("failed to initialize input: {e}"))?;

    loop {
        match chat_input.read_line().await {
            InputEvent::Eof => {
                println!("\n  {}", style("Session ended.").dim());
                save_history(&store, &history).await;
                break;
            }
            InputEvent::Interrupted => {
                println!("\n  {} {}", style(&persona.name).cyan().bold(), persona.farewell_line);
                save_history(&store, &history).await;
                break;
            }
            InputEvent::Message(text) => {
                if text.is_empty() {
                    continue;
                }

                if persona.is_farewell(&text) {
                    let farewell = engine.farewell().await;
                    println!("\n  {} {farewell}", style(&persona.name).cyan().bold());
                    save_history(&store, &history).await;
                    break;
                }

                let request = engine.prepare(turns_to_messages(&history), &text).await;

                let spinner = indicatif::ProgressBar::new_spinner();
                spinner.set_style(
                    indicatif::ProgressStyle::default_spinner()
                        .template("{spinner:.cyan} {msg}")
                        .expect("static spinner template"),
                );
                spinner.set_message("thinking...");
                spinner.enable_steady_tick(std::time::Duration::from_millis(80));

                let mut stream = engine.stream_reply(request);
                let mut first_fragment = true;
                let mut sealed = None;

                while let Some(event) = stream.next().await {
                    match event {
                        ReplyEvent::Fragment(fragment) => {
                            if first_fragment {
                                spinner.finish_and_clear();
                                first_fragment = false;
                                print!("\n  {} ", style(&persona.name).cyan().bold());
                            }
                            print!("{fragment}");
                            let _ = std::io::stdout().flush();
                        }
                        ReplyEvent::Completed(reply) => {
                            sealed = engine.seal_turn(&text, &reply);
                        }
                    }
                }
                if first_fragment {
                    spinner.finish_and_clear();
                }
                println!("\n");

                if let Some(sealed) = sealed {
                    history.push(sealed.turn);
                    save_history(&store, &history).await;
                }
            }
        }
    }

    Ok(())
}

/// Persistence is fire-and-forget: a failed save never interrupts chat.
async fn save_history(store: &JsonHistoryStore, history: &[Turn]) {
    if let Err(e) = store.save(history).await {
        warn!(error = %e, "could not save history");
    }
}

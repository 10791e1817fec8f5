//! Speaking chat client.
//!
//! Talks to a running `airi serve` instance over the streaming chat
//! endpoint and relays the reply to the terminal and, sentence by
//! sentence, to the speech worker. Fragments are segmented incrementally
//! so playback starts while the model is still generating; the remainder
//! is flushed when the stream ends.
//!
//! A missing synthesizer or player downgrades to silent chat; an
//! unreachable service ends the session with a failure status.

use std::io::Write;
use std::path::Path;

use console::style;
use futures_util::StreamExt;
use serde::Serialize;
use tracing::warn;

use airi_core::history::store::HistoryStore;
use airi_core::speech::segmenter::SentenceSegmenter;
use airi_infra::audio::worker::SpeechWorker;
use airi_infra::history::file::JsonHistoryStore;
use airi_types::chat::Turn;
use airi_types::config::AppConfig;

use super::input::{ChatInput, InputEvent};

/// Request body for the service's chat endpoint.
#[derive(Serialize)]
struct ChatPayload<'a> {
    user_input: &'a str,
    history: &'a [Turn],
}

/// Run the speaking chat loop against a remote service.
pub async fn run_speak_loop(config: &AppConfig, data_dir: &Path) -> anyhow::Result<()> {
    let persona = config.persona.clone();
    let service_url = config.client.service_url.trim_end_matches('/').to_string();
    let client = reqwest::Client::new();

    // Fail fast when the service is down; nothing below makes sense then.
    client
        .get(format!("{service_url}/health"))
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| anyhow::anyhow!("could not reach the chat service at {service_url}: {e}"))?;

    let worker = config
        .voice
        .enabled
        .then(|| SpeechWorker::spawn(config.voice.clone()));

    let store = JsonHistoryStore::new(data_dir.join(&config.history.file));
    let mut history = store.load().await;

    println!(
        "  {} is listening. (type 'exit' or 'quit' to leave)",
        style(&persona.name).cyan().bold()
    );

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut chat_input, _writer) =
        ChatInput::new(prompt).map_err(|e| anyhow::anyhow!("failed to initialize input: {e}"))?;

    let mut connection_error: Option<anyhow::Error> = None;

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
                    println!("\n  {} {}", style(&persona.name).cyan().bold(), persona.farewell_line);
                    if let Some(ref worker) = worker {
                        worker.speak(persona.farewell_line.clone()).await;
                    }
                    save_history(&store, &history).await;
                    break;
                }

                let keep = history.len().saturating_sub(config.history.max_turns);
                let payload = ChatPayload {
                    user_input: &text,
                    history: &history[keep..],
                };

                let response = match client
                    .post(format!("{service_url}/chat"))
                    .json(&payload)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                {
                    Ok(response) => response,
                    Err(e) => {
                        eprintln!(
                            "\n  {} Could not reach the chat service at {service_url}",
                            style("!").red().bold()
                        );
                        connection_error = Some(e.into());
                        break;
                    }
                };

                print!("\n  {} ", style(&persona.name).cyan().bold());
                let _ = std::io::stdout().flush();

                let mut byte_stream = response.bytes_stream();
                let mut pending: Vec<u8> = Vec::new();
                let mut segmenter = SentenceSegmenter::new();
                let mut full_response = String::new();
                let mut stream_failed = false;

                while let Some(chunk) = byte_stream.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            eprintln!(
                                "\n  {} Stream interrupted: {e}",
                                style("!").red().bold()
                            );
                            stream_failed = true;
                            break;
                        }
                    };

                    pending.extend_from_slice(&chunk);
                    let fragment = drain_valid_utf8(&mut pending);
                    if fragment.is_empty() {
                        continue;
                    }

                    print!("{fragment}");
                    let _ = std::io::stdout().flush();
                    full_response.push_str(&fragment);

                    if let Some(ref worker) = worker {
                        for sentence in segmenter.push(&fragment) {
                            worker.speak(sentence).await;
                        }
                    }
                }

                // Stream over: hand the remainder to the speech worker.
                if let Some(ref worker) = worker {
                    if let Some(rest) = segmenter.flush() {
                        worker.speak(rest).await;
                    }
                }
                println!("\n");

                if stream_failed {
                    connection_error = Some(anyhow::anyhow!("chat stream interrupted"));
                    break;
                }

                if !full_response.trim().is_empty() {
                    history.push(Turn::new(text, full_response.trim()));
                    save_history(&store, &history).await;
                }
            }
        }
    }

    if let Some(worker) = worker {
        worker.shutdown().await;
    }

    match connection_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Take the longest valid UTF-8 prefix out of `pending`, leaving any
/// trailing partial multi-byte sequence for the next chunk.
fn drain_valid_utf8(pending: &mut Vec<u8>) -> String {
    let valid_len = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) => e.valid_up_to(),
    };
    let fragment = String::from_utf8_lossy(&pending[..valid_len]).into_owned();
    pending.drain(..valid_len);
    fragment
}

/// Persistence is fire-and-forget: a failed save never interrupts chat.
async fn save_history(store: &JsonHistoryStore, history: &[Turn]) {
    if let Err(e) = store.save(history).await {
        warn!(error = %e, "could not save history");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_valid_utf8_complete() {
        let mut pending = "hello".as_bytes().to_vec();
        assert_eq!(drain_valid_utf8(&mut pending), "hello");
        assert!(pending.is_empty());
    }

    #[test]
    fn test_drain_valid_utf8_split_multibyte() {
        // "ら" is three bytes; split it across two chunks.
        let bytes = "どうぞ".as_bytes();
        let mut pending = bytes[..4].to_vec();

        let first = drain_valid_utf8(&mut pending);
        assert_eq!(first, "ど");
        assert_eq!(pending.len(), 1);

        pending.extend_from_slice(&bytes[4..]);
        let second = drain_valid_utf8(&mut pending);
        assert_eq!(second, "うぞ");
        assert!(pending.is_empty());
    }

    #[test]
    fn test_chat_payload_shape() {
        let history = vec![Turn::new("q", "a")];
        let payload = ChatPayload {
            user_input: "hello",
            history: &history,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["user_input"], "hello");
        assert_eq!(json["history"][0]["ai"], "a");
    }
}

//! Streaming chat endpoint.
//!
//! POST /chat
//!
//! Accepts `{ "user_input": "...", "history": [{"user": ..., "ai": ...}] }`
//! and streams the reply back as raw `text/plain` chunks, one fragment at
//! a time, exactly as the backend produces them.
//!
//! Hybrid memory: when the client supplies history, its most recent turns
//! condition the reply; otherwise the most recent rows of the conversation
//! table do. The user message is recorded before generation; the assistant
//! row is recorded fire-and-forget once the response completes and has
//! passed the character guard.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use futures_util::StreamExt;
use serde::Deserialize;
use tracing::warn;

use airi_core::chat::engine::ReplyEvent;
use airi_core::chat::repository::ConversationRepository;
use airi_types::chat::{turns_to_messages, Turn};
use airi_types::llm::{Message, MessageRole};

use crate::state::AppState;

/// The single local user of this personal service.
const DEFAULT_USER: &str = "master";

/// Fragment appended when the character guard rewrote the response after
/// the raw fragments were already streamed.
const CORRECTION_NOTICE: &str = "\n[Character correction applied]";

/// Request body for the chat endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_input: String,
    /// Client-held history; when absent the conversation table is used.
    #[serde(default)]
    pub history: Option<Vec<Turn>>,
}

/// POST /chat - stream a reply as plain text chunks.
pub async fn chat(State(state): State<AppState>, Json(body): Json<ChatRequest>) -> impl IntoResponse {
    let user_input = body.user_input;

    let history = match body.history {
        Some(turns) => {
            let keep = turns.len().saturating_sub(state.client_turns);
            turns_to_messages(&turns[keep..])
        }
        None => match state
            .conversations
            .recent_messages(DEFAULT_USER, state.db_context_rows)
            .await
        {
            Ok(rows) => rows
                .into_iter()
                .rev()
                .map(|row| Message {
                    role: row.role,
                    content: row.message,
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "conversation history unavailable, replying without context");
                Vec::new()
            }
        },
    };

    // Record the user message before generation; a crash mid-stream then
    // loses at most the assistant side of this turn.
    if let Err(e) = state
        .conversations
        .save_message(DEFAULT_USER, None, MessageRole::User, &user_input)
        .await
    {
        warn!(error = %e, "failed to record user message");
    }

    let request = state.engine.prepare(history, &user_input).await;

    // One generation at a time: the backend is a single stateful resource.
    // The guard travels into the response stream and is released when the
    // stream is dropped.
    let gate = state.gate.clone().lock_owned().await;

    let engine = state.engine.clone();
    let conversations = state.conversations.clone();

    let stream = async_stream::stream! {
        let _gate = gate;
        let mut reply_stream = engine.stream_reply(request);

        while let Some(event) = reply_stream.next().await {
            match event {
                ReplyEvent::Fragment(text) => {
                    yield Ok::<_, Infallible>(Bytes::from(text));
                }
                ReplyEvent::Completed(reply) => {
                    if let Some(sealed) = engine.seal_turn(&user_input, &reply) {
                        if sealed.corrected {
                            yield Ok(Bytes::from(CORRECTION_NOTICE));
                        }
                        if let Err(e) = conversations
                            .save_message(
                                DEFAULT_USER,
                                None,
                                MessageRole::Assistant,
                                &sealed.turn.assistant,
                            )
                            .await
                        {
                            warn!(error = %e, "failed to record assistant message");
                        }
                    }
                }
            }
        }
    };

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
}

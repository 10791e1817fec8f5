//! History clipping and message assembly.
//!
//! The assembled sequence for one generation call is: the system prompt
//! (carried on the request's `system` field), the kept history oldest
//! first, then the new user message last. A turn-count cap bounds the
//! history before token pruning runs.

use airi_types::llm::Message;

/// Keep only the most recent `max_turns` turns of an alternating
/// user/assistant message history.
///
/// History is expected in chronological order, newest last. The cut is
/// made on message count (two messages per turn) from the end.
pub fn clip_history(messages: Vec<Message>, max_turns: usize) -> Vec<Message> {
    let keep = max_turns.saturating_mul(2);
    if messages.len() <= keep {
        return messages;
    }
    let skip = messages.len() - keep;
    messages.into_iter().skip(skip).collect()
}

/// Assemble the message sequence for one generation call:
/// history oldest first, then the new user input last.
pub fn assemble(history: Vec<Message>, input: &str) -> Vec<Message> {
    let mut messages = history;
    messages.push(Message::user(input));
    messages
}

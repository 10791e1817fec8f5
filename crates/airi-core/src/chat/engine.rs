//! The streaming reply engine.
//!
//! `ChatEngine` owns the generation backend and coordinates one call:
//! assemble the bounded context, prune it to the token budget, stream the
//! backend's output fragment by fragment, and seal the completed response
//! into a `Turn` for the history buffer and persistence.

use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use airi_types::chat::Turn;
use airi_types::config::GenerationConfig;
use airi_types::llm::{CompletionRequest, Message, StopReason, StreamEvent, Usage};
use airi_types::persona::Persona;

use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::token_budget::TokenBudget;
use crate::persona::guard::{self, Verdict};

use super::{context, prune};

/// A completed (or failed) generation call.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Concatenation of every fragment forwarded to the caller.
    pub text: String,
    pub stop_reason: StopReason,
    pub usage: Usage,
    /// True when the backend raised mid-stream; the text then ends with
    /// the apology fragment and must not be recorded as a Turn.
    pub failed: bool,
}

/// Items produced by [`ChatEngine::stream_reply`].
#[derive(Debug, Clone)]
pub enum ReplyEvent {
    /// One incremental piece of generated text, forwarded before the next
    /// fragment is requested.
    Fragment(String),
    /// Stream end. Always the final item.
    Completed(Reply),
}

/// The response text after the character guard, ready for history.
#[derive(Debug, Clone)]
pub struct SealedTurn {
    pub turn: Turn,
    /// True when the guard rewrote the response.
    pub corrected: bool,
}

/// Coordinates generation calls against a single backend.
///
/// The backend is a shared, stateful resource; callers must serialize
/// generation (the application layer holds one engine behind a lock).
pub struct ChatEngine {
    provider: BoxLlmProvider,
    persona: Persona,
    generation: GenerationConfig,
    budget: TokenBudget,
    max_turns: usize,
}

impl ChatEngine {
    pub fn new(
        provider: BoxLlmProvider,
        persona: Persona,
        generation: GenerationConfig,
        budget: TokenBudget,
        max_turns: usize,
    ) -> Self {
        Self {
            provider,
            persona,
            generation,
            budget,
            max_turns,
        }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn provider(&self) -> &BoxLlmProvider {
        &self.provider
    }

    /// Assemble the request for one call: clip history to the turn cap,
    /// append the new input, attach the persona prompt and sampling config.
    pub fn build_request(&self, history: Vec<Message>, input: &str) -> CompletionRequest {
        let clipped = context::clip_history(history, self.max_turns);
        let messages = context::assemble(clipped, input);

        CompletionRequest {
            messages,
            system: Some(self.persona.system_prompt.clone()),
            max_tokens: self.generation.max_tokens,
            temperature: Some(self.generation.temperature),
            top_p: Some(self.generation.top_p),
            frequency_penalty: Some(self.generation.frequency_penalty),
            presence_penalty: Some(self.generation.presence_penalty),
            stream: true,
            stop_sequences: Some(self.generation.stop.clone()),
        }
    }

    /// Build and prune the request against the token budget.
    ///
    /// A tokenizer failure downgrades to the turn-count cap alone; the
    /// chat call itself proceeds.
    pub async fn prepare(&self, history: Vec<Message>, input: &str) -> CompletionRequest {
        let mut request = self.build_request(history, input);

        match prune::prune_to_budget(&self.provider, &mut request, self.budget.prompt_budget())
            .await
        {
            Ok(count) => {
                debug!(tokens = count, messages = request.messages.len(), "prompt prepared");
            }
            Err(e) => {
                warn!(error = %e, "token counting unavailable; relying on turn cap only");
            }
        }

        request
    }

    /// Run one streaming generation call.
    ///
    /// Lazy, finite, not restartable. Each text fragment is yielded before
    /// the next one is requested; nothing is buffered beyond the running
    /// concatenation needed for the final [`Reply`]. A mid-stream backend
    /// error yields the persona's fixed apology fragment and ends the
    /// stream with `failed = true`.
    pub fn stream_reply(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = ReplyEvent> + Send + 'static>> {
        let apology = self.persona.apology_fragment.clone();
        let inner = self.provider.stream(request);

        Box::pin(async_stream::stream! {
            let mut inner = inner;
            let mut text = String::new();
            let mut stop_reason = StopReason::EndTurn;
            let mut usage = Usage::default();
            let mut failed = false;

            while let Some(event) = inner.next().await {
                match event {
                    Ok(StreamEvent::TextDelta { text: delta }) => {
                        text.push_str(&delta);
                        yield ReplyEvent::Fragment(delta);
                    }
                    Ok(StreamEvent::Usage(u)) => {
                        usage = u;
                    }
                    Ok(StreamEvent::MessageDelta { stop_reason: sr }) => {
                        stop_reason = sr;
                    }
                    Ok(StreamEvent::Done) => break,
                    Ok(StreamEvent::Connected) => {}
                    Err(e) => {
                        warn!(error = %e, "generation failed mid-stream");
                        text.push_str(&apology);
                        yield ReplyEvent::Fragment(apology.clone());
                        failed = true;
                        break;
                    }
                }
            }

            yield ReplyEvent::Completed(Reply {
                text,
                stop_reason,
                usage,
                failed,
            });
        })
    }

    /// Turn a completed reply into a history `Turn`.
    ///
    /// Returns `None` for failed calls and for responses that are empty
    /// after trimming; no partial Turn is ever recorded. The character
    /// guard runs on the completed text, so the recorded response is the
    /// guarded one.
    pub fn seal_turn(&self, input: &str, reply: &Reply) -> Option<SealedTurn> {
        if reply.failed {
            return None;
        }
        let trimmed = reply.text.trim();
        if trimmed.is_empty() {
            return None;
        }

        let (text, corrected) = match guard::enforce(&self.persona, trimmed) {
            Verdict::Clean(text) => {
                let changed = text != trimmed;
                (text, changed)
            }
            Verdict::Replaced(text) => (text, true),
        };

        Some(SealedTurn {
            turn: Turn::new(input, text),
            corrected,
        })
    }

    /// Generate a short in-character farewell (non-streaming).
    ///
    /// Falls back to the persona's fixed farewell line when the backend
    /// is unavailable.
    pub async fn farewell(&self) -> String {
        let request = CompletionRequest {
            messages: vec![Message::user(self.persona.farewell_instruction.clone())],
            system: Some(self.persona.system_prompt.clone()),
            max_tokens: 128,
            temperature: Some(0.7),
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            stream: false,
            stop_sequences: Some(self.generation.stop.clone()),
        };

        match self.provider.complete(&request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                response.content.trim().to_string()
            }
            Ok(_) => self.persona.farewell_line.clone(),
            Err(e) => {
                warn!(error = %e, "farewell generation failed");
                self.persona.farewell_line.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;

    use airi_types::llm::{BackendCapabilities, CompletionResponse, LlmError, TokenCount};

    use crate::llm::provider::LlmProvider;

    /// Scripted backend: replays a fixed list of stream events.
    struct ScriptedProvider {
        capabilities: BackendCapabilities,
        events: Vec<Result<StreamEvent, LlmError>>,
    }

    impl ScriptedProvider {
        fn new(events: Vec<Result<StreamEvent, LlmError>>) -> Self {
            Self {
                capabilities: BackendCapabilities {
                    streaming: true,
                    max_context_tokens: 2048,
                    max_output_tokens: 1024,
                },
                events,
            }
        }
    }

    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn capabilities(&self) -> &BackendCapabilities {
            &self.capabilities
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::Unreachable("scripted".to_string()))
        }

        fn stream(
            &self,
            _request: CompletionRequest,
        ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
            let events: Vec<_> = self
                .events
                .iter()
                .map(|e| match e {
                    Ok(ev) => Ok(ev.clone()),
                    Err(err) => Err(LlmError::Stream(err.to_string())),
                })
                .collect();
            Box::pin(futures_util::stream::iter(events))
        }

        async fn count_tokens(
            &self,
            _request: &CompletionRequest,
        ) -> Result<TokenCount, LlmError> {
            Ok(TokenCount { input_tokens: 0 })
        }
    }

    fn engine_with(events: Vec<Result<StreamEvent, LlmError>>) -> ChatEngine {
        ChatEngine::new(
            BoxLlmProvider::new(ScriptedProvider::new(events)),
            Persona::default(),
            GenerationConfig::default(),
            TokenBudget::new(2048, 512),
            10,
        )
    }

    fn delta(text: &str) -> Result<StreamEvent, LlmError> {
        Ok(StreamEvent::TextDelta {
            text: text.to_string(),
        })
    }

    #[tokio::test]
    async fn test_stream_reply_forwards_fragments_in_order() {
        let engine = engine_with(vec![
            Ok(StreamEvent::Connected),
            delta("Hi "),
            delta("there."),
            Ok(StreamEvent::MessageDelta {
                stop_reason: StopReason::EndTurn,
            }),
            Ok(StreamEvent::Done),
        ]);

        let request = engine.build_request(Vec::new(), "hello");
        let events: Vec<_> = engine.stream_reply(request).collect().await;

        assert_eq!(events.len(), 3);
        match (&events[0], &events[1]) {
            (ReplyEvent::Fragment(a), ReplyEvent::Fragment(b)) => {
                assert_eq!(a, "Hi ");
                assert_eq!(b, "there.");
            }
            other => panic!("unexpected events: {other:?}"),
        }
        match &events[2] {
            ReplyEvent::Completed(reply) => {
                assert_eq!(reply.text, "Hi there.");
                assert!(!reply.failed);
                assert_eq!(reply.stop_reason, StopReason::EndTurn);
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stream_reply_substitutes_apology_on_error() {
        let engine = engine_with(vec![
            delta("partial "),
            Err(LlmError::Backend {
                message: "oom".to_string(),
            }),
        ]);

        let request = engine.build_request(Vec::new(), "hello");
        let events: Vec<_> = engine.stream_reply(request).collect().await;

        // partial fragment, apology fragment, completed
        assert_eq!(events.len(), 3);
        match &events[1] {
            ReplyEvent::Fragment(text) => {
                assert_eq!(text, &Persona::default().apology_fragment)
            }
            other => panic!("expected apology fragment, got {other:?}"),
        }
        match &events[2] {
            ReplyEvent::Completed(reply) => assert!(reply.failed),
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_seal_turn_skips_failed_and_empty() {
        let engine = engine_with(vec![]);

        let failed = Reply {
            text: "anything".to_string(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
            failed: true,
        };
        assert!(engine.seal_turn("hi", &failed).is_none());

        let empty = Reply {
            text: "   \n".to_string(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
            failed: false,
        };
        assert!(engine.seal_turn("hi", &empty).is_none());
    }

    #[tokio::test]
    async fn test_seal_turn_applies_guard() {
        let engine = engine_with(vec![]);

        let reply = Reply {
            text: "I am sorry, but as an AI I cannot pour tea.".to_string(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
            failed: false,
        };
        let sealed = engine.seal_turn("tea please", &reply).unwrap();
        assert!(sealed.corrected);
        assert_eq!(sealed.turn.assistant, Persona::default().fallback_line);
        assert_eq!(sealed.turn.user, "tea please");
    }

    #[tokio::test]
    async fn test_seal_turn_clean_response_unchanged() {
        let engine = engine_with(vec![]);

        let reply = Reply {
            text: "Of course, right away.".to_string(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
            failed: false,
        };
        let sealed = engine.seal_turn("tea please", &reply).unwrap();
        assert!(!sealed.corrected);
        assert_eq!(sealed.turn.assistant, "Of course, right away.");
    }

    #[tokio::test]
    async fn test_farewell_falls_back_on_error() {
        let engine = engine_with(vec![]);
        let farewell = engine.farewell().await;
        assert_eq!(farewell, Persona::default().farewell_line);
    }

    #[test]
    fn test_build_request_shape() {
        let engine = engine_with(vec![]);
        let history = vec![Message::user("q"), Message::assistant("a")];
        let request = engine.build_request(history, "next");

        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages.last().unwrap().content, "next");
        assert!(request.stream);
        assert!(request.system.is_some());
        assert_eq!(
            request.stop_sequences.as_deref(),
            Some(&["<|end|>".to_string(), "<|user|>".to_string()][..])
        );
    }
}

//! Greedy history pruning against the token budget.
//!
//! Given an assembled request, repeatedly drop the oldest user/assistant
//! pair until the backend-counted size of the request fits the budget or
//! nothing prunable remains. The system prompt and the trailing user
//! message are never touched. Oldest context goes first with no semantic
//! weighting; the same input always prunes to the same result.

use airi_types::llm::{CompletionRequest, LlmError};
use tracing::debug;

use crate::llm::box_provider::BoxLlmProvider;

/// Prune `request.messages` in place until the counted token size fits
/// within `budget` or no complete pair remains before the final user
/// message. Returns the last token count observed.
///
/// If even the system prompt plus the newest user message alone exceed
/// the budget, the request is left as-is for the backend to reject or
/// truncate.
pub async fn prune_to_budget(
    provider: &BoxLlmProvider,
    request: &mut CompletionRequest,
    budget: u32,
) -> Result<u32, LlmError> {
    let mut count = provider.count_tokens(request).await?.input_tokens;

    while count > budget && request.messages.len() >= 3 {
        // Oldest pair sits at the front; the final element is the new
        // user message and is never removed.
        let dropped_user = request.messages.remove(0);
        let dropped_assistant = request.messages.remove(0);
        debug!(
            budget,
            count,
            dropped_user_len = dropped_user.content.len(),
            dropped_assistant_len = dropped_assistant.content.len(),
            "pruned oldest turn to fit context window"
        );
        count = provider.count_tokens(request).await?.input_tokens;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;

    use futures_util::Stream;

    use airi_types::llm::{
        BackendCapabilities, CompletionResponse, Message, StopReason, StreamEvent, TokenCount,
        Usage,
    };

    use crate::llm::provider::LlmProvider;

    /// Counts four characters per token over system + message contents,
    /// mirroring the shape of a real tokenizer closely enough for the
    /// pruning loop.
    struct CharCountProvider {
        capabilities: BackendCapabilities,
    }

    impl CharCountProvider {
        fn new() -> Self {
            Self {
                capabilities: BackendCapabilities {
                    streaming: true,
                    max_context_tokens: 2048,
                    max_output_tokens: 1024,
                },
            }
        }
    }

    impl LlmProvider for CharCountProvider {
        fn name(&self) -> &str {
            "char-count"
        }

        fn capabilities(&self) -> &BackendCapabilities {
            &self.capabilities
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: String::new(),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            })
        }

        fn stream(
            &self,
            _request: CompletionRequest,
        ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
            Box::pin(futures_util::stream::empty())
        }

        async fn count_tokens(
            &self,
            request: &CompletionRequest,
        ) -> Result<TokenCount, LlmError> {
            let mut chars = request.system.as_deref().map_or(0, str::len);
            for msg in &request.messages {
                chars += msg.content.len();
            }
            Ok(TokenCount {
                input_tokens: (chars / 4) as u32,
            })
        }
    }

    fn request_with_turns(turns: usize, content_len: usize) -> CompletionRequest {
        let mut messages = Vec::new();
        for _ in 0..turns {
            messages.push(Message::user("u".repeat(content_len)));
            messages.push(Message::assistant("a".repeat(content_len)));
        }
        messages.push(Message::user("final question"));
        CompletionRequest {
            messages,
            system: Some("be helpful".to_string()),
            max_tokens: 256,
            temperature: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            stream: true,
            stop_sequences: None,
        }
    }

    #[tokio::test]
    async fn test_prune_noop_when_under_budget() {
        let provider = BoxLlmProvider::new(CharCountProvider::new());
        let mut request = request_with_turns(2, 40);
        let before = request.messages.clone();

        let count = prune_to_budget(&provider, &mut request, 10_000).await.unwrap();

        assert!(count <= 10_000);
        assert_eq!(request.messages.len(), before.len());
    }

    #[tokio::test]
    async fn test_prune_drops_oldest_pairs_first() {
        let provider = BoxLlmProvider::new(CharCountProvider::new());
        // 10 turns of 400 chars each: ~2000 tokens of history.
        let mut request = request_with_turns(10, 200);

        let count = prune_to_budget(&provider, &mut request, 500).await.unwrap();

        assert!(count <= 500);
        // Last message is still the new user input.
        assert_eq!(request.messages.last().unwrap().content, "final question");
        // Remaining history is the newest turns (oldest were removed).
        assert!(request.messages.len() < 21);
        assert!(request.messages.len() % 2 == 1);
    }

    #[tokio::test]
    async fn test_prune_oversized_irreducible_input_is_forwarded() {
        let provider = BoxLlmProvider::new(CharCountProvider::new());
        let mut request = request_with_turns(0, 0);
        request.messages[0].content = "x".repeat(100_000);

        let count = prune_to_budget(&provider, &mut request, 500).await.unwrap();

        // Nothing prunable: the single oversized user message survives.
        assert!(count > 500);
        assert_eq!(request.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_prune_is_deterministic() {
        let provider = BoxLlmProvider::new(CharCountProvider::new());
        let mut a = request_with_turns(10, 200);
        let mut b = request_with_turns(10, 200);

        prune_to_budget(&provider, &mut a, 500).await.unwrap();
        prune_to_budget(&provider, &mut b, 500).await.unwrap();

        assert_eq!(a.messages.len(), b.messages.len());
        for (ma, mb) in a.messages.iter().zip(&b.messages) {
            assert_eq!(ma.content, mb.content);
        }
    }

    #[tokio::test]
    async fn test_prune_never_removes_system_prompt() {
        let provider = BoxLlmProvider::new(CharCountProvider::new());
        let mut request = request_with_turns(10, 200);
        prune_to_budget(&provider, &mut request, 1).await.unwrap();
        assert_eq!(request.system.as_deref(), Some("be helpful"));
    }
}

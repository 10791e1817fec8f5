//! llama-server SSE stream to [`StreamEvent`] adapter.
//!
//! Maps `async-openai`'s [`ChatCompletionResponseStream`] chunks to the
//! backend-agnostic [`StreamEvent`] enum defined in `airi-types`.
//!
//! The returned stream emits events in this order:
//! 1. `Connected` -- immediately on entry
//! 2. `TextDelta` -- for each text content chunk
//! 3. `MessageDelta` -- with the stop reason when finish_reason appears
//! 4. `Usage` -- token usage (requires `stream_options.include_usage`)
//! 5. `Done` -- at the end of the stream

use std::pin::Pin;

use futures_util::{Stream, StreamExt};

use async_openai::types::chat::{ChatCompletionResponseStream, FinishReason};

use airi_types::llm::{LlmError, StopReason, StreamEvent, Usage};

/// Map a [`ChatCompletionResponseStream`] to a stream of [`StreamEvent`]s.
pub fn map_chat_stream(
    stream: ChatCompletionResponseStream,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
    Box::pin(async_stream::try_stream! {
        yield StreamEvent::Connected;

        let mut stream = stream;
        while let Some(result) = stream.next().await {
            let chunk = result.map_err(|e| LlmError::Stream(e.to_string()))?;

            // The final chunk carries usage data with an empty choices array.
            if let Some(ref usage) = chunk.usage {
                yield StreamEvent::Usage(Usage {
                    input_tokens: usage.prompt_tokens,
                    output_tokens: usage.completion_tokens,
                });
            }

            for choice in &chunk.choices {
                if let Some(ref text) = choice.delta.content {
                    if !text.is_empty() {
                        yield StreamEvent::TextDelta { text: text.clone() };
                    }
                }

                if let Some(ref finish_reason) = choice.finish_reason {
                    let stop_reason = match finish_reason {
                        FinishReason::Length => StopReason::MaxTokens,
                        _ => StopReason::EndTurn,
                    };
                    yield StreamEvent::MessageDelta { stop_reason };
                }
            }
        }

        yield StreamEvent::Done;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_mapping() {
        let cases = vec![
            (FinishReason::Stop, StopReason::EndTurn),
            (FinishReason::Length, StopReason::MaxTokens),
            (FinishReason::ContentFilter, StopReason::EndTurn),
        ];

        for (finish, expected) in cases {
            let mapped = match finish {
                FinishReason::Length => StopReason::MaxTokens,
                _ => StopReason::EndTurn,
            };
            assert_eq!(mapped, expected);
        }
    }
}

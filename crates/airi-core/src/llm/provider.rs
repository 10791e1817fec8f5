//! LlmProvider trait definition.
//!
//! This is the abstraction the chat engine talks to. Uses RPITIT for
//! `complete` and `count_tokens`, and `Pin<Box<dyn Stream>>` for `stream`
//! (streams need to be object-safe for the BoxLlmProvider wrapper).

use std::pin::Pin;

use futures_util::Stream;

use airi_types::llm::{
    BackendCapabilities, CompletionRequest, CompletionResponse, LlmError, StreamEvent, TokenCount,
};

/// Trait for generation backends (llama-server, or a mock in tests).
///
/// Implementations live in airi-infra (e.g., `LlamaServerProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable backend name (e.g., "llama-server").
    fn name(&self) -> &str;

    /// What this backend supports, including its fixed context size.
    fn capabilities(&self) -> &BackendCapabilities;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;

    /// Send a streaming completion request. Returns a stream of events.
    ///
    /// Returns a boxed stream (not RPITIT) because streams need to be
    /// object-safe for the `BoxLlmProvider` wrapper.
    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

    /// Count the tokens the request would occupy, using the backend's own
    /// tokenizer, without generating anything.
    fn count_tokens(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<TokenCount, LlmError>> + Send;
}

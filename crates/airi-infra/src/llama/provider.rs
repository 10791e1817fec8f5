//! LlmProvider implementation over llama-server's OpenAI-compatible API.
//!
//! Uses [`async_openai`] against the local `/v1` endpoint for completions
//! and SSE streaming, and plain [`reqwest`] for the llama-server-specific
//! auxiliary endpoints: `/tokenize` (exact token counts for pruning) and
//! `/props` (the loaded context size).

use std::pin::Pin;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, ChatCompletionStreamOptions,
    CreateChatCompletionRequest, FinishReason, StopConfiguration,
};
use async_openai::Client;
use futures_util::Stream;
use serde::Deserialize;

use airi_core::llm::provider::LlmProvider;
use airi_types::llm::{
    BackendCapabilities, CompletionRequest, CompletionResponse, LlmError, MessageRole, StopReason,
    StreamEvent, TokenCount, Usage,
};

use super::streaming::map_chat_stream;

/// Provider backed by a llama-server instance.
///
/// The server holds exactly one model, so no model routing happens here;
/// the name sent on requests is cosmetic.
pub struct LlamaServerProvider {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    base_url: String,
    capabilities: BackendCapabilities,
}

impl LlamaServerProvider {
    /// Create a provider for a llama-server at `base_url`
    /// (e.g. `http://127.0.0.1:8311`).
    pub fn new(base_url: impl Into<String>, capabilities: BackendCapabilities) -> Self {
        let base_url = base_url.into();
        let openai_config = OpenAIConfig::new()
            .with_api_base(format!("{base_url}/v1"))
            .with_api_key("not-needed");

        Self {
            client: Client::with_config(openai_config),
            http: reqwest::Client::new(),
            base_url,
            capabilities,
        }
    }

    /// Ask the running server for its actual context size.
    ///
    /// Returns `None` when the endpoint is unavailable or the shape is
    /// unexpected; callers then keep the configured size.
    pub async fn detect_context_size(&self) -> Option<u32> {
        #[derive(Deserialize)]
        struct Props {
            default_generation_settings: GenerationSettings,
        }
        #[derive(Deserialize)]
        struct GenerationSettings {
            n_ctx: u32,
        }

        let url = format!("{}/props", self.base_url);
        let props: Props = self.http.get(&url).send().await.ok()?.json().await.ok()?;
        Some(props.default_generation_settings.n_ctx)
    }

    /// Build the wire request from a generic [`CompletionRequest`].
    ///
    /// The system prompt travels as the leading system message; llama-server
    /// folds it into the model's chat template.
    fn build_request(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> CreateChatCompletionRequest {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

        if let Some(ref system) = request.system {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(system.clone()),
                    name: None,
                },
            ));
        }

        for msg in &request.messages {
            let wire_msg = match msg.role {
                MessageRole::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage {
                        content: ChatCompletionRequestSystemMessageContent::Text(
                            msg.content.clone(),
                        ),
                        name: None,
                    },
                ),
                MessageRole::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage {
                        content: ChatCompletionRequestUserMessageContent::Text(
                            msg.content.clone(),
                        ),
                        name: None,
                    },
                ),
                MessageRole::Assistant => {
                    #[allow(deprecated)]
                    ChatCompletionRequestMessage::Assistant(
                        ChatCompletionRequestAssistantMessage {
                            content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                                msg.content.clone(),
                            )),
                            refusal: None,
                            name: None,
                            audio: None,
                            tool_calls: None,
                            function_call: None,
                        },
                    )
                }
            };
            messages.push(wire_msg);
        }

        let mut req = CreateChatCompletionRequest {
            model: "local".to_string(),
            messages,
            max_completion_tokens: Some(request.max_tokens),
            temperature: request.temperature.map(|t| t as f32),
            top_p: request.top_p.map(|t| t as f32),
            frequency_penalty: request.frequency_penalty.map(|p| p as f32),
            presence_penalty: request.presence_penalty.map(|p| p as f32),
            ..Default::default()
        };

        if let Some(ref stops) = request.stop_sequences {
            if !stops.is_empty() {
                req.stop = Some(StopConfiguration::StringArray(stops.clone()));
            }
        }

        if stream {
            req.stream = Some(true);
            req.stream_options = Some(ChatCompletionStreamOptions {
                include_usage: Some(true),
                include_obfuscation: None,
            });
        }

        req
    }

    /// Serialize the request the way the pruning loop measures it: the
    /// system prompt plus every message, as one JSON document.
    fn serialize_for_tokenizer(request: &CompletionRequest) -> String {
        let mut all = Vec::with_capacity(request.messages.len() + 1);
        if let Some(ref system) = request.system {
            all.push(serde_json::json!({"role": "system", "content": system}));
        }
        for msg in &request.messages {
            all.push(serde_json::json!({
                "role": msg.role.to_string(),
                "content": msg.content,
            }));
        }
        serde_json::Value::Array(all).to_string()
    }
}

impl LlmProvider for LlamaServerProvider {
    fn name(&self) -> &str {
        "llama-server"
    }

    fn capabilities(&self) -> &BackendCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let wire_request = self.build_request(request, false);

        let response = self
            .client
            .chat()
            .create(wire_request)
            .await
            .map_err(map_openai_error)?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        let stop_reason = response
            .choices
            .first()
            .and_then(|c| c.finish_reason.as_ref())
            .map(|fr| match fr {
                FinishReason::Length => StopReason::MaxTokens,
                _ => StopReason::EndTurn,
            })
            .unwrap_or(StopReason::EndTurn);

        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            stop_reason,
            usage,
        })
    }

    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
        let wire_request = self.build_request(&request, true);
        let client = self.client.clone();

        Box::pin(async_stream::try_stream! {
            let chat_stream = client
                .chat()
                .create_stream(wire_request)
                .await
                .map_err(map_openai_error)?;

            let mut inner = map_chat_stream(chat_stream);

            use futures_util::StreamExt;
            while let Some(event) = inner.next().await {
                match event {
                    Ok(ev) => yield ev,
                    Err(e) => Err(e)?,
                }
            }
        })
    }

    async fn count_tokens(&self, request: &CompletionRequest) -> Result<TokenCount, LlmError> {
        #[derive(Deserialize)]
        struct TokenizeResponse {
            tokens: Vec<i64>,
        }

        let url = format!("{}/tokenize", self.base_url);
        let body = serde_json::json!({
            "content": Self::serialize_for_tokenizer(request),
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    LlmError::Unreachable(self.base_url.clone())
                } else {
                    LlmError::Tokenizer(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(LlmError::Tokenizer(format!(
                "tokenize endpoint returned {}",
                response.status()
            )));
        }

        let tokenized: TokenizeResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(e.to_string()))?;

        Ok(TokenCount {
            input_tokens: tokenized.tokens.len() as u32,
        })
    }
}

/// Map an `async_openai::error::OpenAIError` to an [`LlmError`].
fn map_openai_error(err: async_openai::error::OpenAIError) -> LlmError {
    use async_openai::error::OpenAIError;

    match &err {
        OpenAIError::Reqwest(reqwest_err) if reqwest_err.is_connect() => {
            LlmError::Unreachable(err.to_string())
        }
        OpenAIError::ApiError(api_err) => LlmError::Backend {
            message: api_err.message.clone(),
        },
        OpenAIError::JSONDeserialize(_, content) => {
            LlmError::Deserialization(format!("failed to parse response: {content}"))
        }
        OpenAIError::StreamError(stream_err) => LlmError::Stream(stream_err.to_string()),
        OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg.clone()),
        _ => LlmError::Backend {
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airi_types::llm::Message;

    fn capabilities() -> BackendCapabilities {
        BackendCapabilities {
            streaming: true,
            max_context_tokens: 2048,
            max_output_tokens: 1024,
        }
    }

    fn sample_request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::user("Hello"), Message::assistant("Hi there!")],
            system: Some("Stay in character.".to_string()),
            max_tokens: 1024,
            temperature: Some(0.8),
            top_p: Some(0.9),
            frequency_penalty: Some(0.2),
            presence_penalty: Some(0.1),
            stream: false,
            stop_sequences: Some(vec!["<|end|>".to_string()]),
        }
    }

    #[test]
    fn test_build_request_prepends_system() {
        let provider = LlamaServerProvider::new("http://127.0.0.1:8311", capabilities());
        let req = provider.build_request(&sample_request(), false);

        // system + user + assistant
        assert_eq!(req.messages.len(), 3);
        assert!(matches!(
            req.messages[0],
            ChatCompletionRequestMessage::System(_)
        ));
        assert_eq!(req.max_completion_tokens, Some(1024));
        assert!(req.stream.is_none());
        assert!(req.stop.is_some());
    }

    #[test]
    fn test_build_request_streaming_sets_options() {
        let provider = LlamaServerProvider::new("http://127.0.0.1:8311", capabilities());
        let req = provider.build_request(&sample_request(), true);

        assert_eq!(req.stream, Some(true));
        let opts = req.stream_options.unwrap();
        assert_eq!(opts.include_usage, Some(true));
    }

    #[test]
    fn test_serialize_for_tokenizer_includes_all_messages() {
        let serialized = LlamaServerProvider::serialize_for_tokenizer(&sample_request());
        let parsed: serde_json::Value = serde_json::from_str(&serialized).unwrap();
        let array = parsed.as_array().unwrap();

        assert_eq!(array.len(), 3);
        assert_eq!(array[0]["role"], "system");
        assert_eq!(array[1]["role"], "user");
        assert_eq!(array[2]["role"], "assistant");
        assert_eq!(array[2]["content"], "Hi there!");
    }

    #[test]
    fn test_provider_name_and_capabilities() {
        let provider = LlamaServerProvider::new("http://127.0.0.1:8311", capabilities());
        assert_eq!(provider.name(), "llama-server");
        assert_eq!(provider.capabilities().max_context_tokens, 2048);
    }
}

//! Configuration types for Airi.
//!
//! `AppConfig` represents the top-level `config.toml` in the data directory.
//! Every field has a default, so a missing or partial file always yields a
//! usable configuration.

use serde::{Deserialize, Serialize};

use crate::persona::Persona;

/// Top-level configuration for the Airi chatbot.
///
/// Loaded from `~/.airi/config.toml` (or `$AIRI_DATA_DIR/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub persona: Persona,
}

/// Local model backend settings (llama-server).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the GGUF model file.
    #[serde(default = "default_model_path")]
    pub path: String,

    /// Context window size in tokens.
    #[serde(default = "default_context_size")]
    pub context_size: u32,

    /// Layers offloaded to the GPU on the first load attempt.
    #[serde(default = "default_gpu_layers")]
    pub gpu_layers: u32,

    /// Worker threads for the backend.
    #[serde(default = "default_threads")]
    pub threads: u32,

    /// Port the managed llama-server listens on.
    #[serde(default = "default_backend_port")]
    pub port: u16,

    /// Override path to the llama-server binary; PATH lookup otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_binary: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            context_size: default_context_size(),
            gpu_layers: default_gpu_layers(),
            threads: default_threads(),
            port: default_backend_port(),
            server_binary: None,
        }
    }
}

/// Sampling parameters for generation calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_frequency_penalty")]
    pub frequency_penalty: f64,
    #[serde(default = "default_presence_penalty")]
    pub presence_penalty: f64,
    #[serde(default = "default_stop_sequences")]
    pub stop: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            frequency_penalty: default_frequency_penalty(),
            presence_penalty: default_presence_penalty(),
            stop: default_stop_sequences(),
        }
    }
}

/// History buffer and pruning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// History file name inside the data directory.
    #[serde(default = "default_history_file")]
    pub file: String,

    /// Turn-count cap applied before token pruning.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Turns the service keeps from client-supplied history.
    #[serde(default = "default_client_turns")]
    pub client_turns: usize,

    /// Tokens reserved below the context size when pruning.
    #[serde(default = "default_safety_margin")]
    pub safety_margin: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            file: default_history_file(),
            max_turns: default_max_turns(),
            client_turns: default_client_turns(),
            safety_margin: default_safety_margin(),
        }
    }
}

/// Text-to-speech playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Whether the speak client attempts audio at all.
    #[serde(default = "default_voice_enabled")]
    pub enabled: bool,

    /// Path to the piper voice model (.onnx).
    #[serde(default = "default_voice_model")]
    pub model: String,

    /// Synthesizer binary.
    #[serde(default = "default_synthesizer")]
    pub synthesizer: String,

    /// Playback binary consuming raw PCM on stdin.
    #[serde(default = "default_player")]
    pub player: String,

    /// Sample rate of the synthesized PCM stream.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: default_voice_enabled(),
            model: default_voice_model(),
            synthesizer: default_synthesizer(),
            player: default_player(),
            sample_rate: default_sample_rate(),
        }
    }
}

/// HTTP service bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// SQLite conversation store file name inside the data directory.
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_file: default_database_file(),
        }
    }
}

/// Settings for clients that talk to a running service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the chat service.
    #[serde(default = "default_service_url")]
    pub service_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
        }
    }
}

fn default_model_path() -> String {
    "models/airi.gguf".to_string()
}

fn default_context_size() -> u32 {
    2048
}

fn default_gpu_layers() -> u32 {
    16
}

fn default_threads() -> u32 {
    6
}

fn default_backend_port() -> u16 {
    8311
}

fn default_temperature() -> f64 {
    0.8
}

fn default_top_p() -> f64 {
    0.9
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_frequency_penalty() -> f64 {
    0.2
}

fn default_presence_penalty() -> f64 {
    0.1
}

fn default_stop_sequences() -> Vec<String> {
    vec!["<|end|>".to_string(), "<|user|>".to_string()]
}

fn default_history_file() -> String {
    "chat_history.json".to_string()
}

fn default_max_turns() -> usize {
    10
}

fn default_client_turns() -> usize {
    5
}

fn default_safety_margin() -> u32 {
    512
}

fn default_voice_enabled() -> bool {
    true
}

fn default_voice_model() -> String {
    "voices/en_US-amy-medium.onnx".to_string()
}

fn default_synthesizer() -> String {
    "piper".to_string()
}

fn default_player() -> String {
    "aplay".to_string()
}

fn default_sample_rate() -> u32 {
    22_050
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_database_file() -> String {
    "airi.db".to_string()
}

fn default_service_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.model.context_size, 2048);
        assert_eq!(config.history.max_turns, 10);
        assert_eq!(config.history.safety_margin, 512);
        assert_eq!(config.generation.max_tokens, 1024);
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.voice.sample_rate, 22_050);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let toml_str = r#"
[model]
path = "/opt/models/small.gguf"
context_size = 4096

[history]
max_turns = 4
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model.path, "/opt/models/small.gguf");
        assert_eq!(config.model.context_size, 4096);
        assert_eq!(config.history.max_turns, 4);
        // Untouched sections stay at defaults
        assert_eq!(config.generation.temperature, 0.8);
        assert_eq!(config.client.service_url, "http://127.0.0.1:5000");
    }

    #[test]
    fn test_stop_sequences_default() {
        let config = AppConfig::default();
        assert_eq!(config.generation.stop, vec!["<|end|>", "<|user|>"]);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = AppConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.model.context_size, config.model.context_size);
        assert_eq!(parsed.persona.name, config.persona.name);
    }
}

//! Process manager for llama-server.
//!
//! Spawns the llama-server binary against the configured GGUF model and
//! supervises it for the life of the session. The first spawn uses the
//! configured GPU layer count; if the server dies or never becomes ready,
//! a second attempt runs fully on CPU with a smaller context. Only when
//! both attempts fail does startup abort -- the one fatal error in the
//! system.

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use airi_types::config::ModelConfig;
use airi_types::llm::LlmError;

/// How long a spawned server may take to answer its health endpoint.
const READY_TIMEOUT: Duration = Duration::from_secs(120);

/// Manager for the llama-server process.
pub struct LlamaServer {
    config: ModelConfig,
    process: Option<Child>,
}

impl LlamaServer {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            process: None,
        }
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.config.port)
    }

    fn binary(&self) -> String {
        self.config
            .server_binary
            .clone()
            .unwrap_or_else(|| "llama-server".to_string())
    }

    /// Spawn with the primary (GPU) configuration, falling back to a
    /// CPU-only spawn with a halved context when the first attempt fails.
    pub async fn start(&mut self) -> Result<(), LlmError> {
        info!(
            model = %self.config.path,
            gpu_layers = self.config.gpu_layers,
            ctx = self.config.context_size,
            "starting llama-server"
        );

        match self
            .try_start(self.config.gpu_layers, self.config.context_size)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "primary model load failed, retrying on CPU");
                self.stop();
                self.try_start(0, self.config.context_size / 2).await
            }
        }
    }

    async fn try_start(&mut self, gpu_layers: u32, context_size: u32) -> Result<(), LlmError> {
        let child = Command::new(self.binary())
            .arg("--model")
            .arg(&self.config.path)
            .arg("--host")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(self.config.port.to_string())
            .arg("--ctx-size")
            .arg(context_size.to_string())
            .arg("--n-gpu-layers")
            .arg(gpu_layers.to_string())
            .arg("--threads")
            .arg(self.config.threads.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                LlmError::Unreachable(format!("failed to spawn {}: {e}", self.binary()))
            })?;

        debug!(pid = child.id(), "llama-server process started");
        self.process = Some(child);

        self.wait_ready(READY_TIMEOUT).await
    }

    /// Poll the health endpoint until the model is loaded.
    async fn wait_ready(&mut self, timeout: Duration) -> Result<(), LlmError> {
        let url = format!("{}/health", self.base_url());
        let client = reqwest::Client::new();
        let start = std::time::Instant::now();

        info!("waiting for llama-server to become ready");
        while start.elapsed() < timeout {
            if !self.is_running() {
                return Err(LlmError::Unreachable(
                    "llama-server exited during startup".to_string(),
                ));
            }

            match client
                .get(&url)
                .timeout(Duration::from_secs(5))
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    info!("llama-server is ready");
                    return Ok(());
                }
                _ => sleep(Duration::from_millis(500)).await,
            }
        }

        Err(LlmError::Unreachable(format!(
            "llama-server not ready after {}s",
            timeout.as_secs()
        )))
    }

    /// Whether the child process is still alive.
    pub fn is_running(&mut self) -> bool {
        match self.process.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(Some(_)) => {
                    self.process = None;
                    false
                }
                Ok(None) => true,
                Err(_) => false,
            },
            None => false,
        }
    }

    /// Terminate the server process.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.process.take() {
            info!(pid = child.id(), "stopping llama-server");
            if let Err(e) = child.kill() {
                warn!(error = %e, "failed to kill llama-server");
            }
            let _ = child.wait();
        }
    }
}

impl Drop for LlamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_uses_configured_port() {
        let config = ModelConfig {
            port: 9311,
            ..ModelConfig::default()
        };
        let server = LlamaServer::new(config);
        assert_eq!(server.base_url(), "http://127.0.0.1:9311");
    }

    #[test]
    fn test_binary_override() {
        let config = ModelConfig {
            server_binary: Some("/opt/llama/llama-server".to_string()),
            ..ModelConfig::default()
        };
        let server = LlamaServer::new(config);
        assert_eq!(server.binary(), "/opt/llama/llama-server");
    }

    #[test]
    fn test_is_running_false_before_start() {
        let mut server = LlamaServer::new(ModelConfig::default());
        assert!(!server.is_running());
    }
}

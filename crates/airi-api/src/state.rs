//! Application state wiring all services together.
//!
//! `start_backend` brings up the local llama-server and builds the chat
//! engine around it; `AppState` adds the HTTP service's extras (the
//! conversation store and the generation gate). The engine is generic at
//! the core layer but pinned here to the concrete infra implementations.

use std::path::Path;
use std::sync::Arc;

use airi_core::chat::engine::ChatEngine;
use airi_core::llm::box_provider::BoxLlmProvider;
use airi_core::llm::token_budget::TokenBudget;
use airi_infra::llama::provider::LlamaServerProvider;
use airi_infra::llama::server::LlamaServer;
use airi_infra::sqlite::conversation::SqliteConversationRepository;
use airi_infra::sqlite::pool::DatabasePool;
use airi_types::config::AppConfig;
use airi_types::llm::BackendCapabilities;
use airi_types::persona::Persona;

/// A running backend: the engine plus the server process it depends on.
///
/// Dropping this kills the llama-server process, so the handle must stay
/// alive as long as generation calls are possible.
pub struct BackendHandle {
    pub engine: Arc<ChatEngine>,
    _server: LlamaServer,
}

/// Spawn llama-server, probe its context size, and assemble the engine.
///
/// This is the only place the process may die at startup: if the GPU
/// attempt and the CPU fallback both fail, the error propagates.
pub async fn start_backend(config: &AppConfig) -> anyhow::Result<BackendHandle> {
    let mut server = LlamaServer::new(config.model.clone());
    server.start().await?;

    let capabilities = BackendCapabilities {
        streaming: true,
        max_context_tokens: config.model.context_size,
        max_output_tokens: config.generation.max_tokens,
    };

    let probe = LlamaServerProvider::new(server.base_url(), capabilities.clone());
    let capabilities = match probe.detect_context_size().await {
        Some(n_ctx) if n_ctx != capabilities.max_context_tokens => {
            tracing::info!(
                configured = capabilities.max_context_tokens,
                loaded = n_ctx,
                "backend reports a different context size; using it"
            );
            BackendCapabilities {
                max_context_tokens: n_ctx,
                ..capabilities
            }
        }
        _ => capabilities,
    };

    let budget = TokenBudget::new(
        capabilities.max_context_tokens,
        config.history.safety_margin,
    );
    let provider = LlamaServerProvider::new(server.base_url(), capabilities);

    let engine = ChatEngine::new(
        BoxLlmProvider::new(provider),
        config.persona.clone(),
        config.generation.clone(),
        budget,
        config.history.max_turns,
    );

    Ok(BackendHandle {
        engine: Arc::new(engine),
        _server: server,
    })
}

/// Shared state for the HTTP service.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ChatEngine>,
    pub conversations: Arc<SqliteConversationRepository>,
    pub persona: Persona,
    /// Turns kept from client-supplied history.
    pub client_turns: usize,
    /// Rows pulled from the conversation table when no history is supplied.
    pub db_context_rows: i64,
    /// Serializes generation calls; the backend is one stateful resource.
    pub gate: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    /// Initialize the service state: connect the database, wire the store.
    pub async fn init(
        config: &AppConfig,
        data_dir: &Path,
        engine: Arc<ChatEngine>,
    ) -> anyhow::Result<Self> {
        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join(&config.server.database_file).display()
        );
        let db_pool = DatabasePool::new(&db_url).await?;
        let conversations = SqliteConversationRepository::new(db_pool);

        Ok(Self {
            engine,
            conversations: Arc::new(conversations),
            persona: config.persona.clone(),
            client_turns: config.history.client_turns,
            db_context_rows: (config.history.max_turns * 2) as i64,
            gate: Arc::new(tokio::sync::Mutex::new(())),
        })
    }
}

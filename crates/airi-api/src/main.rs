//! Airi CLI and chat service entry point.
//!
//! Binary name: `airi`
//!
//! Parses CLI arguments, loads configuration from the data directory, then
//! dispatches to the interactive chat loop, the speaking client, the HTTP
//! service, or one of the small utility commands.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,airi=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    // Shell completions don't need config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "airi", &mut std::io::stdout());
        return Ok(());
    }

    let data_dir = airi_infra::config::resolve_data_dir();
    tokio::fs::create_dir_all(&data_dir).await?;
    let mut config = airi_infra::config::load_config(&data_dir).await;

    match cli.command {
        Commands::Chat => {
            cli::chat::loop_runner::run_chat_loop(&config, &data_dir).await?;
        }

        Commands::Speak { url, no_audio } => {
            if let Some(url) = url {
                config.client.service_url = url;
            }
            if no_audio {
                config.voice.enabled = false;
            }
            cli::chat::speak_runner::run_speak_loop(&config, &data_dir).await?;
        }

        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            // Model load is the one fatal startup error: nothing can be
            // served without a backend.
            let backend = state::start_backend(&config).await?;
            let app_state = state::AppState::init(&config, &data_dir, backend.engine.clone()).await?;

            let addr = format!("{}:{}", config.server.host, config.server.port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            println!(
                "  {} {} listening on http://{addr}",
                console::style("●").green(),
                config.persona.name
            );

            let router = http::router::build_router(app_state);
            axum::serve(listener, router).await?;

            drop(backend);
        }

        Commands::Status => {
            cli::status::status(&config).await?;
        }

        Commands::History { limit } => {
            cli::history::show_history(&config, &data_dir, limit).await;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}

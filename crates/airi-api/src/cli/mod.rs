//! CLI command definitions and dispatch for the `airi` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod chat;
pub mod history;
pub mod status;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// A persona chatbot that lives on your machine.
#[derive(Parser)]
#[command(name = "airi", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chat in the terminal against the local model.
    Chat,

    /// Chat against a running service, speaking replies aloud.
    Speak {
        /// Service URL (overrides config).
        #[arg(long)]
        url: Option<String>,

        /// Disable speech playback for this session.
        #[arg(long)]
        no_audio: bool,
    },

    /// Start the streaming chat service.
    Serve {
        /// Port to listen on (overrides config).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config).
        #[arg(long)]
        host: Option<String>,
    },

    /// Probe a running service's health endpoint.
    Status,

    /// Show recent turns from the history file.
    History {
        /// Number of turns to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

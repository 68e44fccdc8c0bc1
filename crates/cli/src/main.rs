//! PixelPrompt CLI — the main entry point.
//!
//! Commands:
//! - `check` — Diagnose configuration and backend health
//! - `chat`  — Headless chat with a configured agent

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "pixelprompt",
    about = "PixelPrompt — concurrent LLM orchestration for real-time agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true, default_value = "pixelprompt.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Diagnose configuration and backend health
    Check,

    /// Chat with a configured agent from the terminal
    Chat {
        /// Agent id (defaults to the first configured agent)
        #[arg(short, long)]
        agent: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Check => commands::check::run(&cli.config).await?,
        Commands::Chat { agent } => commands::chat::run(&cli.config, agent).await?,
    }

    Ok(())
}

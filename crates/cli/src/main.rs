//! Threadline CLI — the main entry point.
//!
//! Commands:
//! - `import`   — Load a JSON array of messages into the history store
//! - `context`  — Assemble and print the context window for a chat
//! - `models`   — List known models and their context windows
//! - `config`   — Print the default configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "threadline",
    about = "Threadline — budget-bounded chat context assembly",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Import messages from a JSON file into the history store
    Import {
        /// JSON file containing an array of messages
        file: PathBuf,

        /// Assign every imported message to this chat
        #[arg(short, long)]
        chat: Option<String>,
    },

    /// Assemble the history context for a chat
    Context {
        /// Chat to assemble
        #[arg(short, long)]
        chat: String,

        /// Model whose context window bounds the result (defaults to config)
        #[arg(short, long)]
        model: Option<String>,

        /// Walk back from this message instead of the latest one
        #[arg(short, long)]
        start: Option<String>,

        /// File holding the system prompt to reserve space for
        #[arg(long)]
        system_prompt: Option<PathBuf>,

        /// File holding the tool schema to reserve space for
        #[arg(long)]
        tools: Option<PathBuf>,

        /// Print the full window as JSON
        #[arg(long)]
        json: bool,
    },

    /// List known models with their context windows
    Models,

    /// Print configuration
    Config {
        /// Show the effective configuration instead of the defaults
        #[arg(long)]
        current: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Import { file, chat } => commands::import::run(&file, chat).await?,
        Commands::Context {
            chat,
            model,
            start,
            system_prompt,
            tools,
            json,
        } => {
            let args = commands::context::ContextArgs {
                chat,
                model,
                start,
                system_prompt,
                tools,
                json,
            };
            commands::context::run(args).await?
        }
        Commands::Models => commands::models::run().await?,
        Commands::Config { current } => {
            if current {
                commands::config_cmd::show().await?
            } else {
                commands::config_cmd::defaults().await?
            }
        }
    }

    Ok(())
}

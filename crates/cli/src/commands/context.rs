//! `threadline context` — Assemble and print a chat's context window.

use super::backends;
use std::path::PathBuf;
use std::sync::Arc;
use threadline_assembler::{CancellationToken, ContextAssembler};
use threadline_config::AppConfig;
use threadline_core::context::{ContextRequest, ContextWindow};

pub struct ContextArgs {
    pub chat: String,
    pub model: Option<String>,
    pub start: Option<String>,
    pub system_prompt: Option<PathBuf>,
    pub tools: Option<PathBuf>,
    pub json: bool,
}

pub async fn run(args: ContextArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let window = build(&config, &args, &cancel).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&window)?);
    } else {
        print_window(&args.chat, &window);
    }
    Ok(())
}

/// Read the reserved prompt files and build the window.
pub async fn build(
    config: &AppConfig,
    args: &ContextArgs,
    cancel: &CancellationToken,
) -> Result<ContextWindow, Box<dyn std::error::Error>> {
    let model = args.model.as_deref().unwrap_or(&config.default_model);
    let mut request = ContextRequest::new(&args.chat, model)
        .with_system_prompt(read_optional(args.system_prompt.as_ref())?)
        .with_tool_schema(read_optional(args.tools.as_ref())?);
    if let Some(start) = &args.start {
        request = request.starting_at(start);
    }

    let assembler = ContextAssembler::new(
        backends::open_store(config).await?,
        backends::open_cache(config)?,
        Arc::new(backends::catalog(config)),
    )
    .with_max_entries(config.history.max_entries);

    Ok(assembler.build_with_cancel(&request, cancel).await?)
}

fn read_optional(path: Option<&PathBuf>) -> Result<String, Box<dyn std::error::Error>> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()).into()),
        None => Ok(String::new()),
    }
}

fn print_window(chat: &str, window: &ContextWindow) {
    let meta = &window.metadata;
    println!("🧵 Context for chat {chat}");
    println!("==========================");

    if window.is_empty() {
        println!("   (no messages fit)");
    }
    for message in &window.messages {
        let author = message.author_id.as_deref().unwrap_or("-");
        let preview: String = message.text.chars().take(80).collect();
        println!(
            "  {} [{}] {author}: {preview}",
            message.created_at.format("%Y-%m-%d %H:%M:%S"),
            message.id
        );
    }

    println!();
    println!(
        "  Tokens:     {} / {} ({:.1}%)",
        window.total_tokens, meta.budget, meta.utilization_pct
    );
    println!(
        "  Window:     {} (reserved {})",
        meta.context_window, meta.reserved_tokens
    );
    println!("  Truncated:  {}", window.truncated);
    println!(
        "  Graph:      {} entries, cache {}, {} backfilled",
        meta.graph_entries,
        if meta.cache_hit { "hit" } else { "miss" },
        meta.backfilled
    );
}

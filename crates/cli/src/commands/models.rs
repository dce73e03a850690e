//! `threadline models` — List the model catalog.

use super::backends;
use threadline_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let catalog = backends::catalog(&config);

    println!("📚 Known models ({})", catalog.len());
    println!("==================");
    for name in catalog.models() {
        let Some(spec) = catalog.resolve(&name) else {
            continue;
        };
        let marker = if config.models.contains_key(&name) { " (config)" } else { "" };
        println!(
            "  {name:<40} {:>9} tokens  {:.1} chars/token{marker}",
            spec.context_window, spec.chars_per_token
        );
    }
    println!();
    println!("  Default:  {}", config.default_model);
    Ok(())
}

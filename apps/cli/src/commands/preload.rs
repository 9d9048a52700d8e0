//! Preload command implementation.

use super::{build_scheduler, load_config, status::print_pools};
use colored::Colorize;
use hearth_abstraction::MemoryTier;
use serde_json::json;

/// Execute the preload command.
///
/// Warms one model into residency and prints the resulting pool state.
pub async fn execute(
    config_path: &str,
    model: &str,
    tier: Option<&str>,
    json_output: bool,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let scheduler = build_scheduler(&config)?;

    let preferred = match tier {
        Some(name) => Some(
            MemoryTier::parse(name)
                .ok_or_else(|| anyhow::anyhow!("Unknown tier '{}'; expected fast or slow", name))?,
        ),
        None => None,
    };

    scheduler.preload(model, preferred).await?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "model": model,
                "pools": scheduler.status().pools,
            }))?
        );
        return Ok(());
    }

    println!("{} {}", "Loaded".bold().green(), model.green());
    println!();
    print_pools(&scheduler.status());
    Ok(())
}

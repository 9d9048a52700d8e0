//! Validate command implementation.

use super::{format_bytes, load_config};
use colored::Colorize;
use serde_json::json;

/// Execute the validate command.
///
/// Parses and validates the configuration file, then summarizes what it
/// declares: tier capacities, the model catalog, and capability routes.
pub fn execute(config_path: &str, json_output: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    if json_output {
        let output = json!({
            "valid": true,
            "fast_tier_capacity_bytes": config.fast_tier_capacity_bytes,
            "slow_tier_capacity_bytes": config.slow_tier_capacity_bytes,
            "graceful_unload_timeout_ms": config.graceful_unload_timeout.as_millis() as u64,
            "models": config.models.iter().map(|m| json!({
                "id": m.id,
                "aliases": m.aliases,
                "size_bytes": m.size_bytes,
                "affinity": m.affinity,
                "priority": m.priority,
            })).collect::<Vec<_>>(),
            "routes": config.routes.iter().map(|r| json!({
                "capability": r.capability,
                "models": r.models,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Configuration valid".bold().green());
    println!();
    println!("{}", "Tiers:".bold());
    println!("  Fast: {}", format_bytes(config.fast_tier_capacity_bytes).cyan());
    println!("  Slow: {}", format_bytes(config.slow_tier_capacity_bytes).cyan());
    println!();

    println!("{}", format!("Models ({}):", config.models.len()).bold());
    for model in &config.models {
        let aliases = if model.aliases.is_empty() {
            String::new()
        } else {
            format!(" [{}]", model.aliases.join(", ")).dimmed().to_string()
        };
        println!(
            "  {} {} ({:?}, {:?}){}",
            model.id.green(),
            format_bytes(model.size_bytes),
            model.affinity,
            model.priority,
            aliases
        );
    }
    println!();

    println!("{}", format!("Routes ({}):", config.routes.len()).bold());
    for route in &config.routes {
        println!("  {} -> {}", route.capability.green(), route.models.join(" -> "));
    }

    Ok(())
}

//! Status command implementation.

use super::{build_scheduler, format_bytes, load_config};
use colored::Colorize;
use hearth_core::{PriorityClass, SchedulerStatus};
use serde_json::json;

/// Execute the status command.
///
/// Builds a scheduler from the configuration, warms every pinned model the
/// way a daemon would at startup, and prints both pools.
pub async fn execute(config_path: &str, json_output: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let scheduler = build_scheduler(&config)?;

    for model in &config.models {
        if model.priority == PriorityClass::Pinned {
            scheduler.preload(&model.id, None).await?;
        }
    }

    let status = scheduler.status();
    if json_output {
        println!("{}", serde_json::to_string_pretty(&json!({ "pools": status.pools }))?);
        return Ok(());
    }

    print_pools(&status);
    Ok(())
}

pub fn print_pools(status: &SchedulerStatus) {
    println!("{}", "Hearth Status".bold().cyan());
    println!();
    for pool in &status.pools {
        println!(
            "{} {} / {}",
            format!("{} tier:", pool.tier).bold(),
            format_bytes(pool.used_bytes).cyan(),
            format_bytes(pool.capacity_bytes)
        );
        if pool.residents.is_empty() {
            println!("  {}", "(empty)".dimmed());
        }
        for resident in &pool.residents {
            println!(
                "  {} {} ({}, idle {}ms)",
                resident.model_id.green(),
                format_bytes(resident.size_bytes),
                resident.state,
                resident.idle_ms
            );
        }
        println!();
    }
}

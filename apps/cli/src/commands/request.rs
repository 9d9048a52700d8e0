//! Request command implementation.

use super::{build_scheduler, load_config};
use colored::Colorize;
use hearth_router::{RequestRouter, RoutingError};
use serde_json::json;
use std::time::Duration;

/// What a request addresses: a capability chain or one explicit model.
pub enum Target {
    Capability(String),
    Model(String),
}

/// Execute the request command.
///
/// Routes one prompt through the capability's fallback chain (or straight to
/// an explicit model) and prints the serving model, tier, and response.
/// Chain exhaustion lists every failed candidate and exits nonzero.
pub async fn execute(
    config_path: &str,
    target: &Target,
    prompt: &str,
    deadline_ms: Option<u64>,
    json_output: bool,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let scheduler = build_scheduler(&config)?;
    let router = RequestRouter::new(config.route_table(), scheduler);

    let deadline = deadline_ms.map(Duration::from_millis);
    let routed = match target {
        Target::Capability(capability) => {
            router.route_request(capability, prompt, deadline).await
        }
        Target::Model(model) => router.route_model(model, prompt, deadline).await,
    };

    match routed {
        Ok(response) => {
            if json_output {
                println!("{}", serde_json::to_string_pretty(&json!(response))?);
            } else {
                println!(
                    "{} {} ({} tier, fallback depth {})",
                    "Served by".bold(),
                    response.model_id.green(),
                    response.tier,
                    response.fallback_depth
                );
                println!();
                println!("{}", response.content);
            }
            Ok(())
        }
        Err(RoutingError::NoCapableModel { capability, attempts }) => {
            if json_output {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "capability": capability,
                        "attempts": attempts,
                    }))?
                );
            } else {
                eprintln!("{} no capable model for '{}'", "Error:".bold().red(), capability);
                for attempt in &attempts {
                    eprintln!("  {}", attempt.to_string().red());
                }
            }
            anyhow::bail!("Routing failed for '{}'", capability)
        }
        Err(err) => Err(err.into()),
    }
}

//! Hearth CLI - Command-line interface for the Hearth residency scheduler
//!
//! Provides a `hearth` command for validating scheduler configuration and
//! exercising the admission, eviction, and routing pipeline against the
//! built-in mock backend.

mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{preload, request, status, validate};

/// Hearth CLI - model residency scheduling
#[derive(Parser, Debug)]
#[command(
    name = "hearth",
    author,
    version,
    about = "Hearth - model residency scheduling over tiered memory",
    long_about = "Hearth decides which inference models stay resident in limited fast and slow\nmemory tiers, admitting requests under hard capacity budgets with priority-aware\neviction and capability-based fallback routing."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a scheduler configuration file
    ///
    /// Parses and validates the TOML configuration, then prints the model
    /// catalog, tier capacities, and capability routes it declares.
    Validate {
        /// Path to the configuration file
        config: String,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show pool occupancy and the model catalog
    ///
    /// Builds a scheduler from the configuration, warms every pinned model,
    /// and prints both memory pools and their residents.
    Status {
        /// Path to the configuration file
        config: String,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Warm a model into residency
    Preload {
        /// Path to the configuration file
        config: String,

        /// Model id or alias to load
        model: String,

        /// Preferred tier for models that allow either (fast, slow)
        #[arg(long)]
        tier: Option<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Route a request through a capability's fallback chain
    Request {
        /// Path to the configuration file
        config: String,

        /// Capability the request targets
        #[arg(short, long, required_unless_present = "model", conflicts_with = "model")]
        capability: Option<String>,

        /// Explicit model id or alias, bypassing the capability table
        #[arg(short, long)]
        model: Option<String>,

        /// Prompt text
        #[arg(short, long)]
        prompt: String,

        /// Per-candidate deadline in milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber =
        FmtSubscriber::builder().with_max_level(level).without_time().with_target(false).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    match command {
        Command::Validate { config, json } => {
            validate::execute(&config, json)?;
        }
        Command::Status { config, json } => {
            status::execute(&config, json).await?;
        }
        Command::Preload { config, model, tier, json } => {
            preload::execute(&config, &model, tier.as_deref(), json).await?;
        }
        Command::Request { config, capability, model, prompt, deadline_ms, json } => {
            let target = match (capability, model) {
                (Some(capability), None) => request::Target::Capability(capability),
                (None, Some(model)) => request::Target::Model(model),
                _ => unreachable!("clap enforces exactly one of --capability/--model"),
            };
            request::execute(&config, &target, &prompt, deadline_ms, json).await?;
        }
    }

    Ok(())
}

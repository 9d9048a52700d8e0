//! TOML configuration file support for the residency scheduler.

use crate::eviction::EvictionWeights;
use crate::registry::ModelDescriptor;
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Serde helper: durations expressed as integer milliseconds in TOML.
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the file.
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error.
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

fn default_grace() -> Duration {
    Duration::from_secs(5)
}

/// Scheduler configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Fast (accelerator) tier capacity in bytes.
    pub fast_tier_capacity_bytes: u64,

    /// Slow (host) tier capacity in bytes.
    pub slow_tier_capacity_bytes: u64,

    /// How long an unload waits for in-flight requests to drain.
    #[serde(
        rename = "graceful_unload_timeout_ms",
        with = "millis",
        default = "default_grace"
    )]
    pub graceful_unload_timeout: Duration,

    /// Backoff policy for transient backend load failures.
    #[serde(default)]
    pub load_retry: RetryPolicy,

    /// Eviction score weights.
    #[serde(default)]
    pub eviction: EvictionWeights,

    /// The model catalog.
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,

    /// Capability routes: primary candidate plus fallback chain, in order.
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

/// One capability-to-candidate-chain mapping.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteEntry {
    /// The capability/domain string requests arrive with.
    pub capability: String,

    /// Ordered candidate model ids or aliases; the first is the primary.
    pub models: Vec<String>,
}

impl SchedulerConfig {
    /// Capability-to-chain lookup table for the router.
    #[must_use]
    pub fn route_table(&self) -> HashMap<String, Vec<String>> {
        self.routes.iter().map(|r| (r.capability.clone(), r.models.clone())).collect()
    }
}

/// Configuration loader for the scheduler.
pub struct SchedulerConfigLoader;

impl SchedulerConfigLoader {
    /// Loads scheduler configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed, or fails
    /// validation.
    pub fn load(path: &Path) -> Result<SchedulerConfig> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    /// Returns error if the content cannot be parsed or fails validation.
    pub fn parse(content: &str) -> Result<SchedulerConfig> {
        let config: SchedulerConfig = toml::from_str(content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validates scheduler configuration.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid.
    pub fn validate(config: &SchedulerConfig) -> Result<()> {
        if config.fast_tier_capacity_bytes == 0 && config.slow_tier_capacity_bytes == 0 {
            return Err(ConfigError::Validation(
                "At least one memory tier must have nonzero capacity".to_string(),
            ));
        }

        if config.load_retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "load_retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if config.load_retry.multiplier < 1.0 {
            return Err(ConfigError::Validation(format!(
                "load_retry.multiplier must be >= 1.0, got {}",
                config.load_retry.multiplier
            )));
        }

        let weights = &config.eviction;
        for (name, value) in [
            ("priority_weight", weights.priority_weight),
            ("recency_weight", weights.recency_weight),
            ("demand_weight", weights.demand_weight),
        ] {
            if value < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "eviction.{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        if weights.priority_weight + weights.recency_weight + weights.demand_weight <= 0.0 {
            return Err(ConfigError::Validation(
                "Eviction weights must not all be zero".to_string(),
            ));
        }

        let mut known = std::collections::HashSet::new();
        for model in &config.models {
            if model.size_bytes == 0 {
                return Err(ConfigError::Validation(format!(
                    "Model '{}' must declare a nonzero size_bytes",
                    model.id
                )));
            }
            if !known.insert(model.id.clone()) {
                return Err(ConfigError::Validation(format!("Duplicate model id '{}'", model.id)));
            }
            for alias in &model.aliases {
                if !known.insert(alias.clone()) {
                    return Err(ConfigError::Validation(format!(
                        "Alias '{}' is claimed by more than one model",
                        alias
                    )));
                }
            }
        }

        for route in &config.routes {
            if route.capability.is_empty() {
                return Err(ConfigError::Validation(
                    "Route capability must not be empty".to_string(),
                ));
            }
            if route.models.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Route '{}' must list at least one candidate model",
                    route.capability
                )));
            }
            for candidate in &route.models {
                if !known.contains(candidate) {
                    return Err(ConfigError::Validation(format!(
                        "Route '{}' references unknown model '{}'",
                        route.capability, candidate
                    )));
                }
            }
        }

        Ok(())
    }
}

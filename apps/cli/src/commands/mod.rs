//! CLI command implementations.

pub mod preload;
pub mod request;
pub mod status;
pub mod validate;

use hearth_core::{MockBackend, ResidencyScheduler, SchedulerConfig, SchedulerConfigLoader};
use std::path::Path;
use std::sync::Arc;

/// Loads and validates a configuration file.
pub fn load_config(path: &str) -> anyhow::Result<SchedulerConfig> {
    SchedulerConfigLoader::load(Path::new(path))
        .map_err(|e| anyhow::anyhow!("Configuration '{}' rejected: {}", path, e))
}

/// Builds a scheduler over the mock backend, with each model's configured
/// load-latency estimate applied as its simulated load time.
pub fn build_scheduler(config: &SchedulerConfig) -> anyhow::Result<ResidencyScheduler> {
    let mut backend = MockBackend::new();
    for model in &config.models {
        if !model.est_load_latency.is_zero() {
            backend = backend.with_load_delay(&model.id, model.est_load_latency);
        }
    }
    Ok(ResidencyScheduler::new(config, Arc::new(backend))?)
}

/// Human-friendly byte formatting for pool and model sizes.
pub fn format_bytes(bytes: u64) -> String {
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    let bytes = bytes as f64;
    if bytes >= GIB {
        format!("{:.1} GiB", bytes / GIB)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes / MIB)
    } else {
        format!("{bytes:.0} B")
    }
}
